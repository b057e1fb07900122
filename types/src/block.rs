//! State blocks for the account block-lattice.
//!
//! Every block carries the full account state after it is applied (height,
//! balance, representative), so a node can answer account queries from the
//! frontier block alone.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};

use crate::{Address, Amount, BlockHash, Height, NetworkId, Signature, Timestamp, TypesError};

type Blake2b256 = Blake2b<U32>;

/// The operation a block performs on its account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// First block of an account; receives a send and sets the representative.
    Open,
    /// Receive a send into an already opened account.
    Receive,
    /// Send funds to another account.
    Send,
    /// Change the account's representative.
    Change,
}

impl BlockKind {
    /// Whether the block credits funds to the account.
    pub fn is_receive(&self) -> bool {
        matches!(self, Self::Open | Self::Receive)
    }
}

/// Context-dependent link field.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Link {
    /// Change blocks link to nothing.
    None,
    /// Send blocks link to the destination account.
    Destination(Address),
    /// Open/receive blocks link to the send block being received.
    Source(BlockHash),
}

/// An unsigned state block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    pub network: NetworkId,
    /// The account this block belongs to.
    pub account: Address,
    /// Height this block gives the account.
    pub height: Height,
    /// Frontier the block builds on; `None` only for open blocks.
    pub previous: Option<BlockHash>,
    pub representative: Address,
    /// Balance after this block is applied.
    pub balance: Amount,
    /// Amount moved by a send or credited by a receive; zero for change.
    pub amount: Amount,
    pub link: Link,
    pub timestamp: Timestamp,
}

impl Block {
    /// Canonical encoding the hash and signature are computed over.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("Block is always serializable")
    }

    /// Blake2b-256 of the canonical encoding.
    pub fn hash(&self) -> BlockHash {
        let mut hasher = Blake2b256::new();
        hasher.update(self.canonical_bytes());
        let mut output = [0u8; 32];
        output.copy_from_slice(&hasher.finalize());
        BlockHash::new(output)
    }

    /// Structural checks that do not need the ledger.
    pub fn check_shape(&self) -> Result<(), TypesError> {
        let fail = |reason: &str| Err(TypesError::InvalidBlock(reason.to_string()));
        match self.kind {
            BlockKind::Open => {
                if self.height != Height::OPEN || self.previous.is_some() {
                    return fail("open block must be height 1 with no previous");
                }
                if !matches!(self.link, Link::Source(_)) || self.amount != self.balance {
                    return fail("open block must receive its whole balance from a source");
                }
            }
            BlockKind::Receive | BlockKind::Send | BlockKind::Change => {
                if self.height <= Height::OPEN || self.previous.is_none() {
                    return fail("non-open block must extend a previous block");
                }
            }
        }
        match (&self.kind, &self.link) {
            (BlockKind::Send, Link::Destination(dest)) if *dest == self.account => {
                fail("cannot send to self")
            }
            (BlockKind::Send, Link::Destination(_)) | (BlockKind::Receive, Link::Source(_)) => {
                if self.amount.is_zero() {
                    fail("amount must be positive")
                } else {
                    Ok(())
                }
            }
            (BlockKind::Change, Link::None) => {
                if self.amount.is_zero() {
                    Ok(())
                } else {
                    fail("change block cannot move funds")
                }
            }
            (BlockKind::Open, _) => Ok(()),
            _ => fail("link does not match block kind"),
        }
    }
}

/// A block with its hash, signature and proof-of-work attached.
///
/// Immutable once built; the hash is computed at construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBlock {
    pub block: Block,
    pub hash: BlockHash,
    pub signature: Signature,
    pub work: u64,
}

impl SignedBlock {
    pub fn new(block: Block, signature: Signature, work: u64) -> Self {
        let hash = block.hash();
        Self {
            block,
            hash,
            signature,
            work,
        }
    }

    pub fn height(&self) -> Height {
        self.block.height
    }

    pub fn account(&self) -> &Address {
        &self.block.account
    }
}
