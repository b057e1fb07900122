//! Nullable node: an in-memory ledger with fault injection.
//!
//! Implements [`NodeClient`] by validating and applying blocks against a
//! local account-chain map, the way a real node would, so wallet code runs
//! unchanged against it. Faults (timeouts, dropped acknowledgements,
//! rejections, failing queries) are scripted per call.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use lattice_client::{ClientError, FrontierUpdate, NodeClient, RejectReason, SubmitOutcome};
use lattice_types::{
    AccountInfo, Address, Amount, Block, BlockHash, BlockKind, Height, KeyPair, Link, NetworkId,
    Receivable, SignedBlock, Timestamp,
};
use lattice_work::validate_block_work;
use tracing::debug;

use crate::NullClock;

/// A scripted response for the next submission.
#[derive(Clone, Debug, PartialEq, Eq)]
enum SubmitFault {
    /// Answer with a timeout without applying the block.
    Timeout,
    /// Apply the block, then answer with a timeout.
    DropAck,
    /// Refuse the block with the given reason.
    Reject(RejectReason),
}

#[derive(Default)]
struct Ledger {
    accounts: HashMap<Address, AccountInfo>,
    blocks: HashMap<BlockHash, SignedBlock>,
    chains: HashMap<Address, Vec<BlockHash>>,
    receivables: HashMap<BlockHash, Receivable>,
    submit_faults: VecDeque<SubmitFault>,
    failing_queries: usize,
    submissions: usize,
}

pub struct NullNode {
    network: NetworkId,
    check_work: bool,
    clock: NullClock,
    ledger: Mutex<Ledger>,
}

impl NullNode {
    /// An empty ledger. Use [`NullNode::with_genesis`] for a funded one.
    pub fn new(network: NetworkId) -> Self {
        Self {
            network,
            check_work: true,
            clock: NullClock::default(),
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// A ledger whose only account is `genesis`, opened at height 1 with the
    /// entire supply.
    pub fn with_genesis(network: NetworkId, genesis: &KeyPair) -> Self {
        let node = Self::new(network);
        let address = lattice_crypto::derive_address(&genesis.public);
        let block = Block {
            kind: BlockKind::Open,
            network,
            account: address.clone(),
            height: Height::OPEN,
            previous: None,
            representative: address.clone(),
            balance: Amount::MAX,
            amount: Amount::MAX,
            link: Link::Source(BlockHash::ZERO),
            timestamp: node.clock.now(),
        };
        let signature = lattice_crypto::sign_block(&block.hash(), &genesis.private);
        let signed = SignedBlock::new(block, signature, 0);
        node.ledger.lock().unwrap().apply(&signed);
        node
    }

    /// Accept blocks regardless of their proof-of-work.
    pub fn without_work_check(mut self) -> Self {
        self.check_work = false;
        self
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    pub fn clock(&self) -> &NullClock {
        &self.clock
    }

    /// The next `count` submissions time out without being applied.
    pub fn timeout_next_submits(&self, count: usize) {
        let mut ledger = self.ledger.lock().unwrap();
        ledger
            .submit_faults
            .extend(std::iter::repeat(SubmitFault::Timeout).take(count));
    }

    /// The next `count` submissions are applied but their answer is lost.
    pub fn drop_next_acks(&self, count: usize) {
        let mut ledger = self.ledger.lock().unwrap();
        ledger
            .submit_faults
            .extend(std::iter::repeat(SubmitFault::DropAck).take(count));
    }

    /// The next submission is refused with `reason`.
    pub fn reject_next(&self, reason: RejectReason) {
        let mut ledger = self.ledger.lock().unwrap();
        ledger.submit_faults.push_back(SubmitFault::Reject(reason));
    }

    /// The next `count` queries (anything but submit) fail with a transport error.
    pub fn fail_next_queries(&self, count: usize) {
        self.ledger.lock().unwrap().failing_queries = count;
    }

    /// Number of submit calls seen, including faulted ones.
    pub fn submissions(&self) -> usize {
        self.ledger.lock().unwrap().submissions
    }

    pub fn account_info(&self, address: &Address) -> Option<AccountInfo> {
        self.ledger.lock().unwrap().accounts.get(address).cloned()
    }

    /// All blocks of `address` in height order.
    pub fn chain(&self, address: &Address) -> Vec<SignedBlock> {
        let ledger = self.ledger.lock().unwrap();
        ledger
            .chains
            .get(address)
            .map(|hashes| {
                hashes
                    .iter()
                    .filter_map(|hash| ledger.blocks.get(hash).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn pending_receivables(&self, address: &Address) -> Vec<Receivable> {
        self.ledger.lock().unwrap().receivables_for(address, Amount::ZERO)
    }

    fn query_fault(&self) -> Result<(), ClientError> {
        let mut ledger = self.ledger.lock().unwrap();
        if ledger.failing_queries > 0 {
            ledger.failing_queries -= 1;
            return Err(ClientError::Transport("scripted query failure".into()));
        }
        Ok(())
    }

    fn validate(&self, ledger: &Ledger, signed: &SignedBlock) -> Result<(), RejectReason> {
        let block = &signed.block;
        block
            .check_shape()
            .map_err(|e| RejectReason::Invalid(e.to_string()))?;
        if block.network != self.network {
            return Err(RejectReason::Invalid(format!(
                "block for network {} sent to {}",
                block.network, self.network
            )));
        }
        if ledger.blocks.contains_key(&signed.hash) {
            return Err(RejectReason::AlreadyApplied);
        }
        let public_key = lattice_crypto::public_key_of(&block.account)
            .map_err(|e| RejectReason::Invalid(e.to_string()))?;
        if !lattice_crypto::verify_block(signed, &public_key) {
            return Err(RejectReason::InvalidSignature);
        }

        let current = ledger.accounts.get(&block.account);
        let previous_balance = match (block.kind, current) {
            (BlockKind::Open, None) => Amount::ZERO,
            (BlockKind::Open, Some(_)) => return Err(RejectReason::StalePrevious),
            (_, Some(info))
                if Some(info.frontier) == block.previous && info.height.next() == block.height =>
            {
                info.balance
            }
            _ => return Err(RejectReason::StalePrevious),
        };

        if self.check_work && validate_block_work(signed, self.network).is_err() {
            return Err(RejectReason::InvalidWork);
        }

        match (&block.kind, &block.link) {
            (BlockKind::Send, Link::Destination(destination)) => {
                if !lattice_crypto::validate_address(destination.as_str()) {
                    return Err(RejectReason::Invalid("bad destination".into()));
                }
                let expected = previous_balance
                    .checked_sub(block.amount)
                    .ok_or(RejectReason::InsufficientBalance)?;
                if expected != block.balance {
                    return Err(RejectReason::Invalid("balance does not match amount".into()));
                }
            }
            (BlockKind::Open | BlockKind::Receive, Link::Source(source)) => {
                let receivable = match ledger.receivables.get(source) {
                    Some(r) if r.receiver == block.account => r,
                    Some(_) => return Err(RejectReason::UnknownSource),
                    None if ledger.blocks.contains_key(source) => {
                        return Err(RejectReason::AlreadyReceived)
                    }
                    None => return Err(RejectReason::UnknownSource),
                };
                if receivable.amount != block.amount
                    || previous_balance.checked_add(block.amount) != Some(block.balance)
                {
                    return Err(RejectReason::Invalid("balance does not match amount".into()));
                }
                if block.timestamp <= receivable.timestamp {
                    return Err(RejectReason::Invalid("receive precedes its send".into()));
                }
            }
            (BlockKind::Change, Link::None) => {
                if block.balance != previous_balance {
                    return Err(RejectReason::Invalid("change cannot move funds".into()));
                }
            }
            _ => return Err(RejectReason::Invalid("link does not match kind".into())),
        }
        Ok(())
    }
}

impl Ledger {
    fn apply(&mut self, signed: &SignedBlock) {
        let block = &signed.block;
        self.accounts.insert(
            block.account.clone(),
            AccountInfo {
                address: block.account.clone(),
                height: block.height,
                frontier: signed.hash,
                balance: block.balance,
                representative: block.representative.clone(),
                last_timestamp: block.timestamp,
            },
        );
        self.chains
            .entry(block.account.clone())
            .or_default()
            .push(signed.hash);
        self.blocks.insert(signed.hash, signed.clone());

        match &block.link {
            Link::Destination(destination) => {
                self.receivables.insert(
                    signed.hash,
                    Receivable {
                        source_hash: signed.hash,
                        source_account: block.account.clone(),
                        receiver: destination.clone(),
                        amount: block.amount,
                        timestamp: block.timestamp,
                    },
                );
            }
            Link::Source(source) => {
                self.receivables.remove(source);
            }
            Link::None => {}
        }
    }

    fn receivables_for(&self, address: &Address, min_amount: Amount) -> Vec<Receivable> {
        let mut found: Vec<Receivable> = self
            .receivables
            .values()
            .filter(|r| &r.receiver == address && r.amount >= min_amount)
            .cloned()
            .collect();
        found.sort_by_key(|r| (r.timestamp, r.source_hash));
        found
    }
}

#[async_trait]
impl NodeClient for NullNode {
    async fn account(&self, address: &Address) -> Result<Option<AccountInfo>, ClientError> {
        self.query_fault()?;
        Ok(self.account_info(address))
    }

    async fn submit(&self, block: &SignedBlock) -> Result<SubmitOutcome, ClientError> {
        let mut ledger = self.ledger.lock().unwrap();
        ledger.submissions += 1;
        let fault = ledger.submit_faults.pop_front();
        match &fault {
            Some(SubmitFault::Timeout) => return Err(ClientError::Timeout),
            Some(SubmitFault::Reject(reason)) => {
                return Ok(SubmitOutcome::Rejected(reason.clone()))
            }
            Some(SubmitFault::DropAck) | None => {}
        }

        if let Err(reason) = self.validate(&ledger, block) {
            debug!(hash = %block.hash, %reason, "null node rejected block");
            return Ok(SubmitOutcome::Rejected(reason));
        }
        ledger.apply(block);
        debug!(
            account = %block.block.account,
            height = block.block.height.value(),
            "null node applied block"
        );

        if fault == Some(SubmitFault::DropAck) {
            return Err(ClientError::Timeout);
        }
        Ok(SubmitOutcome::Accepted)
    }

    async fn frontiers(&self, addresses: &[Address]) -> Result<Vec<FrontierUpdate>, ClientError> {
        self.query_fault()?;
        let ledger = self.ledger.lock().unwrap();
        Ok(addresses
            .iter()
            .filter_map(|address| ledger.accounts.get(address))
            .map(|info| FrontierUpdate {
                address: info.address.clone(),
                height: info.height,
                frontier: info.frontier,
            })
            .collect())
    }

    async fn block(&self, hash: &BlockHash) -> Result<Option<SignedBlock>, ClientError> {
        self.query_fault()?;
        Ok(self.ledger.lock().unwrap().blocks.get(hash).cloned())
    }

    async fn block_at(
        &self,
        address: &Address,
        height: Height,
    ) -> Result<Option<SignedBlock>, ClientError> {
        self.query_fault()?;
        let ledger = self.ledger.lock().unwrap();
        let index = match height.value().checked_sub(1) {
            Some(index) => index as usize,
            None => return Ok(None),
        };
        Ok(ledger
            .chains
            .get(address)
            .and_then(|hashes| hashes.get(index))
            .and_then(|hash| ledger.blocks.get(hash))
            .cloned())
    }

    async fn receivables(
        &self,
        address: &Address,
        min_amount: Amount,
    ) -> Result<Vec<Receivable>, ClientError> {
        self.query_fault()?;
        Ok(self
            .ledger
            .lock()
            .unwrap()
            .receivables_for(address, min_amount))
    }

    async fn now(&self) -> Result<Timestamp, ClientError> {
        Ok(self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_types::KeyIndex;
    use lattice_work::{work_target, WorkGenerator, WorkThresholds};

    fn keys(index: u32) -> KeyPair {
        let seed = lattice_types::Seed::new([11; 64]);
        lattice_crypto::derive_keypair(&seed, KeyIndex::new(index)).unwrap()
    }

    fn finish(block: Block, keys: &KeyPair) -> SignedBlock {
        let target = work_target(&block).unwrap();
        let threshold = WorkThresholds::for_network(block.network).threshold_for(block.kind);
        let work = WorkGenerator.generate(&target, threshold).unwrap().0;
        let signature = lattice_crypto::sign_block(&block.hash(), &keys.private);
        SignedBlock::new(block, signature, work)
    }

    fn send(node: &NullNode, from: &KeyPair, to: &Address, amount: u64) -> SignedBlock {
        let address = lattice_crypto::derive_address(&from.public);
        let info = node.account_info(&address).unwrap();
        let block = Block {
            kind: BlockKind::Send,
            network: node.network(),
            account: address,
            height: info.height.next(),
            previous: Some(info.frontier),
            representative: info.representative,
            balance: info.balance.checked_sub(Amount::new(amount)).unwrap(),
            amount: Amount::new(amount),
            link: Link::Destination(to.clone()),
            timestamp: node.clock().now(),
        };
        finish(block, from)
    }

    #[tokio::test]
    async fn genesis_holds_supply() {
        let genesis = keys(0);
        let node = NullNode::with_genesis(NetworkId::Dev, &genesis);
        let address = lattice_crypto::derive_address(&genesis.public);
        let info = node.account(&address).await.unwrap().unwrap();
        assert_eq!(info.height, Height::OPEN);
        assert_eq!(info.balance, Amount::MAX);
    }

    #[tokio::test]
    async fn send_creates_receivable_and_open_consumes_it() {
        let genesis = keys(0);
        let receiver = keys(1);
        let receiver_address = lattice_crypto::derive_address(&receiver.public);
        let node = NullNode::with_genesis(NetworkId::Dev, &genesis);

        let block = send(&node, &genesis, &receiver_address, 1_000);
        assert_eq!(node.submit(&block).await.unwrap(), SubmitOutcome::Accepted);
        let receivables = node.receivables(&receiver_address, Amount::ZERO).await.unwrap();
        assert_eq!(receivables.len(), 1);
        assert_eq!(receivables[0].amount, Amount::new(1_000));

        let open = Block {
            kind: BlockKind::Open,
            network: NetworkId::Dev,
            account: receiver_address.clone(),
            height: Height::OPEN,
            previous: None,
            representative: receiver_address.clone(),
            balance: Amount::new(1_000),
            amount: Amount::new(1_000),
            link: Link::Source(block.hash),
            timestamp: node.clock().now(),
        };
        let open = finish(open, &receiver);
        assert_eq!(node.submit(&open).await.unwrap(), SubmitOutcome::Accepted);
        assert!(node.pending_receivables(&receiver_address).is_empty());
        assert_eq!(
            node.account_info(&receiver_address).unwrap().balance,
            Amount::new(1_000)
        );
    }

    #[tokio::test]
    async fn stale_previous_and_duplicates_rejected() {
        let genesis = keys(0);
        let node = NullNode::with_genesis(NetworkId::Dev, &genesis);
        let to = lattice_crypto::derive_address(&keys(1).public);

        let first = send(&node, &genesis, &to, 10);
        let competing = send(&node, &genesis, &to, 20);
        assert_eq!(node.submit(&first).await.unwrap(), SubmitOutcome::Accepted);
        assert_eq!(
            node.submit(&first).await.unwrap(),
            SubmitOutcome::Rejected(RejectReason::AlreadyApplied)
        );
        assert_eq!(
            node.submit(&competing).await.unwrap(),
            SubmitOutcome::Rejected(RejectReason::StalePrevious)
        );
    }

    #[tokio::test]
    async fn bad_signature_rejected() {
        let genesis = keys(0);
        let node = NullNode::with_genesis(NetworkId::Dev, &genesis);
        let to = lattice_crypto::derive_address(&keys(1).public);
        let mut block = send(&node, &genesis, &to, 10);
        block.signature = lattice_crypto::sign_block(&block.hash, &keys(2).private);
        assert_eq!(
            node.submit(&block).await.unwrap(),
            SubmitOutcome::Rejected(RejectReason::InvalidSignature)
        );
    }

    #[tokio::test]
    async fn dropped_ack_still_applies() {
        let genesis = keys(0);
        let node = NullNode::with_genesis(NetworkId::Dev, &genesis);
        let to = lattice_crypto::derive_address(&keys(1).public);
        let block = send(&node, &genesis, &to, 10);

        node.drop_next_acks(1);
        assert_eq!(node.submit(&block).await, Err(ClientError::Timeout));
        let address = lattice_crypto::derive_address(&genesis.public);
        assert_eq!(node.account_info(&address).unwrap().frontier, block.hash);
    }

    #[tokio::test]
    async fn timeout_does_not_apply() {
        let genesis = keys(0);
        let node = NullNode::with_genesis(NetworkId::Dev, &genesis);
        let to = lattice_crypto::derive_address(&keys(1).public);
        let block = send(&node, &genesis, &to, 10);

        node.timeout_next_submits(1);
        assert_eq!(node.submit(&block).await, Err(ClientError::Timeout));
        let address = lattice_crypto::derive_address(&genesis.public);
        assert_eq!(node.account_info(&address).unwrap().height, Height::OPEN);
        assert_eq!(node.submissions(), 1);
    }

    #[tokio::test]
    async fn block_at_walks_the_chain() {
        let genesis = keys(0);
        let node = NullNode::with_genesis(NetworkId::Dev, &genesis);
        let address = lattice_crypto::derive_address(&genesis.public);
        let to = lattice_crypto::derive_address(&keys(1).public);
        let block = send(&node, &genesis, &to, 10);
        node.submit(&block).await.unwrap();

        let second = node.block_at(&address, Height::new(2)).await.unwrap().unwrap();
        assert_eq!(second.hash, block.hash);
        assert!(node.block_at(&address, Height::new(3)).await.unwrap().is_none());
        assert!(node.block_at(&address, Height::UNOPENED).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn scripted_query_failure() {
        let node = NullNode::new(NetworkId::Dev);
        node.fail_next_queries(1);
        assert!(node.frontiers(&[]).await.is_err());
        assert!(node.frontiers(&[]).await.is_ok());
    }
}
