//! Token amounts in raw units.
//!
//! Amounts are fixed-point integers (u64) to avoid floating-point errors.
//! The smallest unit is 1 raw; the total supply is [`Amount::MAX`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// An amount of raw units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);

    /// Total supply, held entirely by the genesis account at height 1.
    pub const MAX: Self = Self(18_000_000_000_000_000_000);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Add, failing if the result would exceed the total supply.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0
            .checked_add(other.0)
            .filter(|sum| *sum <= Self::MAX.0)
            .map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Like [`Amount::checked_add`] but with a typed error.
    pub fn try_add(self, other: Self) -> Result<Self, TypesError> {
        self.checked_add(other).ok_or(TypesError::AmountOverflow)
    }

    /// Like [`Amount::checked_sub`] but with a typed error.
    pub fn try_sub(self, other: Self) -> Result<Self, TypesError> {
        self.checked_sub(other).ok_or(TypesError::AmountUnderflow {
            needed: other.0,
            available: self.0,
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} raw", self.0)
    }
}

impl From<u64> for Amount {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
