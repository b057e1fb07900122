//! Node-side views of accounts, unreceived sends and account history entries.

use serde::{Deserialize, Serialize};

use crate::{Address, Amount, BlockHash, BlockKind, Height, Timestamp};

/// An account as the node currently sees it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub address: Address,
    pub height: Height,
    /// Hash of the block at `height`.
    pub frontier: BlockHash,
    pub balance: Amount,
    pub representative: Address,
    /// Timestamp of the frontier block.
    pub last_timestamp: Timestamp,
}

/// A send block that the receiving account has not yet matched with a
/// receive block.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Receivable {
    /// Hash of the send block; the receive block links to it.
    pub source_hash: BlockHash,
    pub source_account: Address,
    pub receiver: Address,
    pub amount: Amount,
    pub timestamp: Timestamp,
}

/// One confirmed block rendered as a ledger entry of its account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub hash: BlockHash,
    pub address: Address,
    pub height: Height,
    pub kind: BlockKind,
    /// Counterparty for sends and receives, new representative for changes.
    pub subject: Address,
    pub previous_balance: Amount,
    pub balance: Amount,
    pub timestamp: Timestamp,
}

impl AccountEntry {
    /// Signed balance movement of this entry.
    pub fn delta(&self) -> i128 {
        i128::from(self.balance.raw()) - i128::from(self.previous_balance.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_delta_is_signed() {
        let entry = AccountEntry {
            hash: BlockHash::new([3; 32]),
            address: Address::new("lat_a"),
            height: Height::new(2),
            kind: BlockKind::Send,
            subject: Address::new("lat_b"),
            previous_balance: Amount::new(1_000),
            balance: Amount::new(400),
            timestamp: Timestamp::from_millis(5),
        };
        assert_eq!(entry.delta(), -600);
    }

    #[test]
    fn receivable_json_roundtrip() {
        let receivable = Receivable {
            source_hash: BlockHash::new([1; 32]),
            source_account: Address::new("lat_a"),
            receiver: Address::new("lat_b"),
            amount: Amount::new(1_000),
            timestamp: Timestamp::from_millis(10),
        };
        let json = serde_json::to_string(&receivable).unwrap();
        let back: Receivable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, receivable);
    }
}
