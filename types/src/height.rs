//! Account heights and key derivation indexes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of blocks ever applied to an account.
///
/// 0 means the account has never been opened; 1 is the open block.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Height(u64);

impl Height {
    pub const UNOPENED: Self = Self(0);
    pub const OPEN: Self = Self(1);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn is_unopened(&self) -> bool {
        self.0 == 0
    }

    /// The height the next block on this account will carry.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Heights strictly after `self` up to and including `to`.
    pub fn range_to(self, to: Height) -> impl Iterator<Item = Height> {
        (self.0.saturating_add(1)..=to.0).map(Height)
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Slot in the hardened derivation path `m/44'/coin'/index'`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyIndex(u32);

impl KeyIndex {
    /// Largest index usable with hardened derivation (the top bit is the
    /// hardened marker).
    pub const MAX: Self = Self(0x7FFF_FFFF);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0 <= Self::MAX.0
    }

    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for KeyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for KeyIndex {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_to_walks_intermediate_heights() {
        let heights: Vec<u64> = Height::new(3)
            .range_to(Height::new(6))
            .map(|h| h.value())
            .collect();
        assert_eq!(heights, vec![4, 5, 6]);
    }

    #[test]
    fn range_to_empty_when_not_advanced() {
        assert_eq!(Height::new(5).range_to(Height::new(5)).count(), 0);
        assert_eq!(Height::new(5).range_to(Height::new(2)).count(), 0);
    }

    #[test]
    fn key_index_hardened_bound() {
        assert!(KeyIndex::new(0).is_valid());
        assert!(KeyIndex::MAX.is_valid());
        assert!(!KeyIndex::new(0x8000_0000).is_valid());
    }
}
