use lattice_client::{ClientError, RejectReason};
use lattice_crypto::CryptoError;
use lattice_types::{Address, Amount, KeyIndex};
use lattice_work::WorkError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Amount, available: Amount },

    #[error("invalid key index: {0}")]
    InvalidIndex(String),

    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    /// The account's frontier moved under a block we built.
    #[error("stale previous block for {0}")]
    StalePrevious(Address),

    #[error("work unavailable after {attempts} attempts: {reason}")]
    WorkUnavailable { attempts: u32, reason: String },

    #[error("block rejected: {0}")]
    Rejected(RejectReason),

    /// Another block advanced the account while ours was in flight.
    #[error("account {0} was advanced by another block")]
    Superseded(Address),

    #[error("node request timed out")]
    NetworkTimeout,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("account {0} is not open in this wallet")]
    AccountNotOpen(KeyIndex),

    #[error("account {0} is already open in this wallet")]
    AlreadyOpen(KeyIndex),

    #[error("cannot send to own account {0}")]
    SelfSend(Address),

    #[error("amount must be positive")]
    InvalidAmount,

    #[error("a representative is required to open {0}")]
    MissingRepresentative(Address),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// A monitor listener reported a failure.
    #[error("listener failed: {0}")]
    Listener(String),

    /// The task driving a submission ended without an outcome.
    #[error("submission aborted: {0}")]
    Aborted(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("node error: {0}")]
    Client(#[from] ClientError),
}

impl WalletError {
    /// Transient failures that a later attempt can overcome.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::NetworkTimeout | Self::WorkUnavailable { .. } => true,
            Self::Client(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<CryptoError> for WalletError {
    fn from(error: CryptoError) -> Self {
        match error {
            CryptoError::InvalidIndex(index) => Self::InvalidIndex(index.to_string()),
            CryptoError::InvalidAddress(address) => Self::InvalidAddress(address),
            CryptoError::DerivationFailed(reason) => Self::InvalidIndex(reason),
        }
    }
}

impl From<WorkError> for WalletError {
    fn from(error: WorkError) -> Self {
        Self::WorkUnavailable {
            attempts: 1,
            reason: error.to_string(),
        }
    }
}
