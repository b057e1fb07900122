//! Fundamental types for the lattice wallet engine.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! addresses, hashes, amounts, heights, key indexes, timestamps, blocks and the
//! node-side views of accounts, receivables and account entries.

pub mod account;
pub mod address;
pub mod amount;
pub mod block;
pub mod error;
pub mod hash;
pub mod height;
pub mod keys;
pub mod network;
pub mod time;

pub use account::{AccountEntry, AccountInfo, Receivable};
pub use address::Address;
pub use amount::Amount;
pub use block::{Block, BlockKind, Link, SignedBlock};
pub use error::TypesError;
pub use hash::BlockHash;
pub use height::{Height, KeyIndex};
pub use keys::{KeyPair, PrivateKey, PublicKey, Seed, Signature};
pub use network::NetworkId;
pub use time::Timestamp;
