//! Wallet engine for a block-lattice ledger.
//!
//! Provides everything a wallet application needs:
//! - Hierarchical key derivation from a BIP39 seed
//! - Block construction for send, receive, open and change
//! - A submission pipeline with work generation, retries and per-account ordering
//! - Account, transaction and ledger-entry monitors
//! - Automatic receiving of incoming sends
//! - Resumable transaction history backed by a repository

pub mod account;
pub mod account_monitor;
pub mod auto_receiver;
pub mod block_builder;
pub mod config;
pub mod error;
pub mod keys;
pub mod pipeline;
pub mod receivable;
pub mod repository;
pub mod signer;
pub mod subscription;
pub mod task;
pub mod transaction_monitor;
pub mod wallet;

pub use account::AccountState;
pub use account_monitor::{AccountChanged, AccountMonitor};
pub use auto_receiver::RepresentativeProvider;
pub use config::WalletConfig;
pub use error::WalletError;
pub use keys::{DerivedAccount, KeyDerivation};
pub use pipeline::{Intent, SubmissionPipeline, SubmissionStage};
pub use repository::{
    AccountEntryRepository, HistoryRepository, InMemoryRepository, Recorded, TransactionRepository,
};
pub use signer::{KeySigner, SeedSigner, Signer};
pub use subscription::SubscriptionHandle;
pub use task::TaskHandle;
pub use transaction_monitor::{AccountEntryMonitor, HeightProvider, TransactionMonitor};
pub use wallet::Wallet;
