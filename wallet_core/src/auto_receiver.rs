//! Background receiving of incoming sends.
//!
//! On every interval tick, and whenever the account monitor reports a
//! change, the auto-receiver lists the node's receivables for each wallet
//! address and issues a receive block for every one it has not received
//! yet. Failures are logged and left for the next pass; one stuck
//! receivable does not hold up the others.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use lattice_client::{NodeClient, RejectReason};
use lattice_types::{Address, Amount, Receivable, SignedBlock};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::account_monitor::AccountMonitor;
use crate::receivable::ReceivableBook;
use crate::subscription::SubscriptionHandle;
use crate::task::TaskHandle;
use crate::WalletError;

/// Representative for an account the auto-receiver is about to open.
pub type RepresentativeProvider = Arc<dyn Fn(&Address) -> Option<Address> + Send + Sync>;

/// The accounts the auto-receiver works for.
#[async_trait]
pub trait ReceiveTarget: Send + Sync {
    async fn receiving_addresses(&self) -> Vec<Address>;

    async fn receive(
        &self,
        receivable: Receivable,
        representative: Option<Address>,
    ) -> Result<SignedBlock, WalletError>;
}

#[derive(Clone)]
pub struct AutoReceiverSettings {
    pub min_amount: Amount,
    pub interval: Duration,
    pub representative: RepresentativeProvider,
}

/// Summary of one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    pub received: usize,
    pub failed: usize,
}

struct Receiver {
    target: Weak<dyn ReceiveTarget>,
    node: Arc<dyn NodeClient>,
    book: Arc<ReceivableBook>,
    settings: AutoReceiverSettings,
}

/// Running auto-receiver; stops when dropped.
pub struct AutoReceiver {
    _changes: SubscriptionHandle,
    task: TaskHandle,
}

impl AutoReceiver {
    pub fn spawn(
        target: Weak<dyn ReceiveTarget>,
        monitor: &AccountMonitor,
        book: Arc<ReceivableBook>,
        settings: AutoReceiverSettings,
    ) -> Self {
        let wake = Arc::new(Notify::new());
        let changes = monitor.subscribe(
            {
                let wake = wake.clone();
                move |_| {
                    wake.notify_one();
                    Ok(())
                }
            },
            |e| debug!(error = %e, "auto-receiver ignoring monitor error"),
        );

        let receiver = Receiver {
            target,
            node: monitor.node().clone(),
            book,
            settings,
        };
        let task = TaskHandle::spawn(move |mut shutdown_rx| async move {
            let mut interval = tokio::time::interval(receiver.settings.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    _ = interval.tick() => {}
                    _ = wake.notified() => {}
                }
                match receiver.pass().await {
                    Some(report) if report.received + report.failed > 0 => {
                        debug!(received = report.received, failed = report.failed, "auto-receive pass");
                    }
                    Some(_) => {}
                    None => break,
                }
            }
            debug!("auto-receiver stopped");
        });

        Self {
            _changes: changes,
            task,
        }
    }

    pub async fn stop(self) {
        self.task.stop().await;
    }
}

impl Receiver {
    /// One sweep over every address. `None` once the wallet is gone.
    async fn pass(&self) -> Option<PassReport> {
        let target = self.target.upgrade()?;
        let mut report = PassReport::default();
        let min_amount = self.settings.min_amount;

        for address in target.receiving_addresses().await {
            match self.node.receivables(&address, min_amount).await {
                Ok(found) => {
                    self.book.record(found).await;
                }
                Err(e) => {
                    warn!(account = %address, error = %e, "listing receivables failed");
                    continue;
                }
            }

            for receivable in self.book.unreceived(&address, min_amount).await {
                let representative = (self.settings.representative)(&address);
                match target.receive(receivable.clone(), representative).await {
                    Ok(block) => {
                        info!(
                            account = %address,
                            amount = receivable.amount.raw(),
                            source = %receivable.source_hash,
                            height = block.height().value(),
                            "auto-received"
                        );
                        report.received += 1;
                    }
                    Err(WalletError::Rejected(RejectReason::AlreadyReceived)) => {
                        self.book.mark_received(&receivable).await;
                    }
                    Err(e) => {
                        warn!(
                            account = %address,
                            source = %receivable.source_hash,
                            error = %e,
                            "auto-receive failed, retrying next pass"
                        );
                        report.failed += 1;
                    }
                }
            }
        }
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_client::{ClientError, FrontierUpdate, SubmitOutcome};
    use lattice_types::{AccountInfo, BlockHash, Height, Timestamp};
    use std::sync::Mutex as StdMutex;

    fn bob() -> Address {
        Address::new("lat_bob")
    }

    fn receivable(tag: u8, amount: u64) -> Receivable {
        Receivable {
            source_hash: BlockHash::new([tag; 32]),
            source_account: Address::new("lat_alice"),
            receiver: bob(),
            amount: Amount::new(amount),
            timestamp: Timestamp::from_millis(1),
        }
    }

    /// Node that only answers receivable listings.
    struct Listing(StdMutex<Vec<Receivable>>);

    #[async_trait]
    impl NodeClient for Listing {
        async fn account(&self, _: &Address) -> Result<Option<AccountInfo>, ClientError> {
            Ok(None)
        }
        async fn submit(&self, _: &SignedBlock) -> Result<SubmitOutcome, ClientError> {
            Err(ClientError::Protocol("unused".into()))
        }
        async fn frontiers(&self, _: &[Address]) -> Result<Vec<FrontierUpdate>, ClientError> {
            Ok(Vec::new())
        }
        async fn block(&self, _: &BlockHash) -> Result<Option<SignedBlock>, ClientError> {
            Ok(None)
        }
        async fn block_at(
            &self,
            _: &Address,
            _: Height,
        ) -> Result<Option<SignedBlock>, ClientError> {
            Ok(None)
        }
        async fn receivables(
            &self,
            address: &Address,
            min_amount: Amount,
        ) -> Result<Vec<Receivable>, ClientError> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .iter()
                .filter(|r| &r.receiver == address && r.amount >= min_amount)
                .cloned()
                .collect())
        }
    }

    /// Receives by recording; fails sources listed in `failing`.
    #[derive(Default)]
    struct Recorder {
        received: StdMutex<Vec<(BlockHash, Option<Address>)>>,
        failing: StdMutex<Vec<BlockHash>>,
    }

    #[async_trait]
    impl ReceiveTarget for Recorder {
        async fn receiving_addresses(&self) -> Vec<Address> {
            vec![bob()]
        }

        async fn receive(
            &self,
            receivable: Receivable,
            representative: Option<Address>,
        ) -> Result<SignedBlock, WalletError> {
            if self.failing.lock().unwrap().contains(&receivable.source_hash) {
                return Err(WalletError::NetworkTimeout);
            }
            self.received
                .lock()
                .unwrap()
                .push((receivable.source_hash, representative));
            Err(WalletError::Rejected(RejectReason::AlreadyReceived))
        }
    }

    fn receiver(target: &Arc<Recorder>, listing: Vec<Receivable>, min: u64) -> Receiver {
        let target: Arc<dyn ReceiveTarget> = target.clone();
        Receiver {
            target: Arc::downgrade(&target),
            node: Arc::new(Listing(StdMutex::new(listing))),
            book: Arc::new(ReceivableBook::new()),
            settings: AutoReceiverSettings {
                min_amount: Amount::new(min),
                interval: Duration::from_secs(60),
                representative: Arc::new(|_: &Address| Some(Address::new("lat_rep"))),
            },
        }
    }

    #[tokio::test]
    async fn pass_receives_above_minimum_only() {
        let target = Arc::new(Recorder::default());
        let receiver = receiver(&target, vec![receivable(1, 5), receivable(2, 500)], 100);
        receiver.pass().await.unwrap();

        let received = target.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, BlockHash::new([2; 32]));
        assert_eq!(received[0].1, Some(Address::new("lat_rep")));
    }

    #[tokio::test]
    async fn received_entries_are_not_retried() {
        let target = Arc::new(Recorder::default());
        let receiver = receiver(&target, vec![receivable(1, 500)], 1);
        receiver.pass().await.unwrap();
        receiver.pass().await.unwrap();
        assert_eq!(target.received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn one_failure_does_not_block_the_rest() {
        let target = Arc::new(Recorder::default());
        target.failing.lock().unwrap().push(BlockHash::new([1; 32]));
        let receiver = receiver(&target, vec![receivable(1, 500), receivable(2, 600)], 1);

        let report = receiver.pass().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(target.received.lock().unwrap().len(), 1);

        // The failed one is retried on the next pass.
        target.failing.lock().unwrap().clear();
        receiver.pass().await.unwrap();
        assert_eq!(target.received.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn pass_stops_once_target_is_gone() {
        let target = Arc::new(Recorder::default());
        let receiver = receiver(&target, vec![receivable(1, 500)], 1);
        drop(target);
        assert!(receiver.pass().await.is_none());
    }
}
