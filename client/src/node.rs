//! The node capability trait and its wire types.

use std::fmt;

use async_trait::async_trait;
use lattice_types::{
    AccountInfo, Address, Amount, BlockHash, Height, Receivable, SignedBlock, Timestamp,
};
use serde::{Deserialize, Serialize};

use crate::ClientError;

/// Why the node refused a block. Refusals are final for that block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// `previous` is not the account's current frontier.
    StalePrevious,
    /// The exact block is already part of the ledger.
    AlreadyApplied,
    InsufficientBalance,
    InvalidSignature,
    InvalidWork,
    /// The linked send does not exist or does not target this account.
    UnknownSource,
    AlreadyReceived,
    Invalid(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StalePrevious => f.write_str("previous block is not the frontier"),
            Self::AlreadyApplied => f.write_str("block already applied"),
            Self::InsufficientBalance => f.write_str("insufficient balance"),
            Self::InvalidSignature => f.write_str("invalid signature"),
            Self::InvalidWork => f.write_str("insufficient work"),
            Self::UnknownSource => f.write_str("unknown source block"),
            Self::AlreadyReceived => f.write_str("source already received"),
            Self::Invalid(detail) => write!(f, "invalid block: {detail}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Accepted,
    Rejected(RejectReason),
}

/// One account's frontier as reported by a frontier poll.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierUpdate {
    pub address: Address,
    pub height: Height,
    pub frontier: BlockHash,
}

/// Query and submit operations the wallet needs from a node.
///
/// `Ok(None)` means the node answered and the object does not exist;
/// transport failures are `Err`.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Current state of `address`, or `None` if it was never opened.
    async fn account(&self, address: &Address) -> Result<Option<AccountInfo>, ClientError>;

    async fn submit(&self, block: &SignedBlock) -> Result<SubmitOutcome, ClientError>;

    /// Frontiers of the opened accounts among `addresses`.
    async fn frontiers(&self, addresses: &[Address]) -> Result<Vec<FrontierUpdate>, ClientError>;

    async fn block(&self, hash: &BlockHash) -> Result<Option<SignedBlock>, ClientError>;

    async fn block_at(
        &self,
        address: &Address,
        height: Height,
    ) -> Result<Option<SignedBlock>, ClientError>;

    /// Unreceived sends to `address` of at least `min_amount`, oldest first.
    async fn receivables(
        &self,
        address: &Address,
        min_amount: Amount,
    ) -> Result<Vec<Receivable>, ClientError>;

    /// The node's clock, used to timestamp new blocks.
    async fn now(&self) -> Result<Timestamp, ClientError> {
        Ok(Timestamp::now())
    }
}

#[async_trait]
impl<N: NodeClient + ?Sized> NodeClient for std::sync::Arc<N> {
    async fn account(&self, address: &Address) -> Result<Option<AccountInfo>, ClientError> {
        (**self).account(address).await
    }

    async fn submit(&self, block: &SignedBlock) -> Result<SubmitOutcome, ClientError> {
        (**self).submit(block).await
    }

    async fn frontiers(&self, addresses: &[Address]) -> Result<Vec<FrontierUpdate>, ClientError> {
        (**self).frontiers(addresses).await
    }

    async fn block(&self, hash: &BlockHash) -> Result<Option<SignedBlock>, ClientError> {
        (**self).block(hash).await
    }

    async fn block_at(
        &self,
        address: &Address,
        height: Height,
    ) -> Result<Option<SignedBlock>, ClientError> {
        (**self).block_at(address, height).await
    }

    async fn receivables(
        &self,
        address: &Address,
        min_amount: Amount,
    ) -> Result<Vec<Receivable>, ClientError> {
        (**self).receivables(address, min_amount).await
    }

    async fn now(&self) -> Result<Timestamp, ClientError> {
        (**self).now().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_outcome_json_shape() {
        let accepted = serde_json::to_value(SubmitOutcome::Accepted).unwrap();
        assert_eq!(accepted, serde_json::json!({ "status": "accepted" }));

        let rejected: SubmitOutcome = serde_json::from_value(serde_json::json!({
            "status": "rejected",
            "reason": "stale_previous"
        }))
        .unwrap();
        assert_eq!(rejected, SubmitOutcome::Rejected(RejectReason::StalePrevious));
    }

    #[test]
    fn reject_reason_display() {
        assert_eq!(
            RejectReason::Invalid("bad link".into()).to_string(),
            "invalid block: bad link"
        );
    }
}
