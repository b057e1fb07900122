//! Errors from key derivation and address decoding.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("key index {0} is outside the hardened derivation range")]
    InvalidIndex(u32),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("key derivation failed: {0}")]
    DerivationFailed(String),
}
