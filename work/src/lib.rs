//! Proof-of-work for the account block-lattice.
//!
//! Every block carries a nonce whose Blake2b work value over the block's
//! work target clears a network- and kind-dependent threshold. The wallet
//! never computes work inline; it asks a [`WorkProvider`].

pub mod error;
pub mod generator;
pub mod precompute;
pub mod provider;
pub mod target;
pub mod thresholds;
pub mod validator;

pub use error::WorkError;
pub use generator::WorkGenerator;
pub use precompute::WorkCache;
pub use provider::{CachedWorkProvider, CpuWorkProvider, WorkProvider};
pub use target::{work_target, WorkTarget};
pub use thresholds::WorkThresholds;
pub use validator::{validate_block_work, validate_work, work_value};

/// The result of PoW generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkNonce(pub u64);
