//! What a block's proof-of-work is computed over.

use std::fmt;

use lattice_types::{Block, BlockHash};

use crate::WorkError;

/// 32 bytes the work nonce is hashed with.
///
/// For every block except the first this is the previous frontier, so work
/// can be computed as soon as the previous block is confirmed. Open blocks
/// have no previous and use the account public key instead.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkTarget(pub [u8; 32]);

impl WorkTarget {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<BlockHash> for WorkTarget {
    fn from(hash: BlockHash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl fmt::Debug for WorkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkTarget(")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "\u{2026})")
    }
}

/// Work target of `block`.
pub fn work_target(block: &Block) -> Result<WorkTarget, WorkError> {
    match block.previous {
        Some(previous) => Ok(previous.into()),
        None => lattice_crypto::decode_address(block.account.as_str())
            .map(WorkTarget)
            .ok_or_else(|| WorkError::InvalidTarget(block.account.to_string())),
    }
}
