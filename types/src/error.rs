//! Error type for parsing and arithmetic on the fundamental types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid block hash: {0}")]
    InvalidHash(String),

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("invalid network: {0}")]
    InvalidNetwork(String),

    #[error("invalid seed length: expected 64 bytes, got {0}")]
    InvalidSeedLength(usize),

    #[error("amount overflow")]
    AmountOverflow,

    #[error("amount underflow: need {needed}, have {available}")]
    AmountUnderflow { needed: u64, available: u64 },
}
