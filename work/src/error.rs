use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkError {
    #[error("work value {actual} below threshold {minimum}")]
    InsufficientDifficulty { actual: u64, minimum: u64 },

    #[error("work generation cancelled")]
    Cancelled,

    #[error("invalid work target: {0}")]
    InvalidTarget(String),

    #[error("work provider unavailable: {0}")]
    Unavailable(String),
}
