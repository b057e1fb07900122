//! Nullable infrastructure for deterministic testing.
//!
//! Every external collaborator of the wallet engine (clock, node, work
//! provider) has a test-friendly implementation here that:
//! - Returns deterministic values
//! - Can be controlled programmatically, including injected faults
//! - Never touches the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests and demos.

pub mod clock;
pub mod node;
pub mod work;

pub use clock::NullClock;
pub use node::NullNode;
pub use work::NullWorkProvider;
