//! Account address type with `lat_` prefix.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// A lattice account address, always prefixed with `lat_`.
///
/// Derived from the account's public key via base32 encoding plus a Blake2b
/// checksum (see `lattice_crypto::derive_address`). This type only checks the
/// prefix; checksum validation lives in the crypto crate.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// The standard prefix for all lattice addresses.
    pub const PREFIX: &'static str = "lat_";

    /// Create a new address from a raw string.
    ///
    /// # Panics
    /// Panics if the string does not start with `lat_`. Use [`Address::parse`]
    /// for untrusted input.
    pub fn new(raw: impl Into<String>) -> Self {
        let s = raw.into();
        assert!(s.starts_with(Self::PREFIX), "address must start with lat_");
        Self(s)
    }

    /// Parse an address, rejecting strings without the `lat_` prefix or body.
    pub fn parse(raw: &str) -> Result<Self, TypesError> {
        let candidate = Self(raw.to_string());
        if candidate.is_valid() {
            Ok(candidate)
        } else {
            Err(TypesError::InvalidAddress(raw.to_string()))
        }
    }

    /// Return the raw address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the address has the prefix and a non-empty body.
    pub fn is_valid(&self) -> bool {
        self.0.starts_with(Self::PREFIX) && self.0.len() > Self::PREFIX.len()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}
