//! The node as seen by the wallet.
//!
//! [`NodeClient`] is the capability the wallet engine consumes: account
//! queries, block submission, frontier polling and receivable listing.
//! [`HttpNodeClient`] implements it over the node's JSON-RPC endpoint; tests
//! use the in-memory node from `lattice-nullables`.

pub mod error;
pub mod http;
pub mod node;

pub use error::ClientError;
pub use http::HttpNodeClient;
pub use node::{FrontierUpdate, NodeClient, RejectReason, SubmitOutcome};
