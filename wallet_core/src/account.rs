//! Local view of one wallet account.
//!
//! An [`AccountState`] is an immutable snapshot. The wallet keeps the
//! current snapshot of each account in an [`AccountCell`] and replaces it
//! wholesale, so readers never observe a half-applied block.

use std::sync::Arc;

use lattice_types::{
    AccountInfo, Address, Amount, BlockHash, Height, KeyIndex, SignedBlock, Timestamp,
};
use tokio::sync::RwLock;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountState {
    pub index: KeyIndex,
    pub address: Address,
    /// 0 while the account has no blocks on the ledger.
    pub height: Height,
    /// Hash of the block at `height`; `None` while unopened.
    pub frontier: Option<BlockHash>,
    pub balance: Amount,
    pub representative: Option<Address>,
    /// Timestamp of the frontier block.
    pub timestamp: Timestamp,
}

impl AccountState {
    /// State of an account that has never been opened on the ledger.
    pub fn unopened(index: KeyIndex, address: Address) -> Self {
        Self {
            index,
            address,
            height: Height::UNOPENED,
            frontier: None,
            balance: Amount::ZERO,
            representative: None,
            timestamp: Timestamp::EPOCH,
        }
    }

    /// Build the local state from the node's answer to an account query.
    pub fn from_node(index: KeyIndex, address: Address, info: Option<AccountInfo>) -> Self {
        match info {
            Some(info) => Self {
                index,
                address,
                height: info.height,
                frontier: Some(info.frontier),
                balance: info.balance,
                representative: Some(info.representative),
                timestamp: info.last_timestamp,
            },
            None => Self::unopened(index, address),
        }
    }

    pub fn is_open(&self) -> bool {
        !self.height.is_unopened()
    }

    /// The state after `block` is applied on top of this one.
    ///
    /// The caller guarantees `block` extends this state's frontier.
    pub fn apply(&self, block: &SignedBlock) -> Self {
        Self {
            index: self.index,
            address: self.address.clone(),
            height: block.block.height,
            frontier: Some(block.hash),
            balance: block.block.balance,
            representative: Some(block.block.representative.clone()),
            timestamp: block.block.timestamp,
        }
    }

    /// Whether `block` is the next block on this account.
    pub fn is_extended_by(&self, block: &SignedBlock) -> bool {
        block.block.account == self.address
            && block.block.previous == self.frontier
            && block.block.height == self.height.next()
    }
}

/// Holder of an account's current snapshot.
#[derive(Debug)]
pub struct AccountCell {
    current: RwLock<Arc<AccountState>>,
}

impl AccountCell {
    pub fn new(state: AccountState) -> Self {
        Self {
            current: RwLock::new(Arc::new(state)),
        }
    }

    pub async fn snapshot(&self) -> Arc<AccountState> {
        self.current.read().await.clone()
    }

    pub async fn replace(&self, state: AccountState) {
        *self.current.write().await = Arc::new(state);
    }
}
