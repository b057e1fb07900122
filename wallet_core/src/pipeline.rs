//! Block submission: build, work, sign, submit, confirm.
//!
//! Each submission walks
//! `Built -> WorkRequested -> Signed -> Submitted -> Confirmed | Rejected | TimedOut`.
//! Submissions on one account are serialized behind a per-account lock that
//! is held from build to terminal state, so every block is built on the
//! frontier its predecessor left behind. Once a block reaches `Submitted`
//! it is driven to a terminal state on a spawned task, even if the caller
//! stops waiting.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use lattice_client::{NodeClient, RejectReason, SubmitOutcome};
use lattice_types::{Address, Amount, Block, BlockKind, Receivable, SignedBlock};
use lattice_work::{work_target, WorkProvider, WorkTarget, WorkThresholds};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::account::{AccountCell, AccountState};
use crate::block_builder::{build_change, build_receive, build_send};
use crate::receivable::ReceivableBook;
use crate::signer::Signer;
use crate::{WalletConfig, WalletError};

/// What the caller wants the next block on an account to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    Send {
        recipient: Address,
        amount: Amount,
        representative: Option<Address>,
    },
    /// `representative` is only used when the receive opens the account.
    Receive {
        receivable: Receivable,
        representative: Option<Address>,
    },
    Change {
        representative: Address,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionStage {
    Built,
    WorkRequested,
    Signed,
    Submitted,
    Confirmed,
    Rejected,
    TimedOut,
}

impl SubmissionStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Rejected | Self::TimedOut)
    }

    /// Terminal stage a submission result corresponds to.
    pub fn terminal_for(result: &Result<SignedBlock, WalletError>) -> Self {
        match result {
            Ok(_) => Self::Confirmed,
            Err(WalletError::NetworkTimeout) => Self::TimedOut,
            Err(_) => Self::Rejected,
        }
    }
}

impl fmt::Display for SubmissionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Built => "built",
            Self::WorkRequested => "work_requested",
            Self::Signed => "signed",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
            Self::TimedOut => "timed_out",
        };
        f.write_str(name)
    }
}

/// Where the node stands relative to a block whose submit went unanswered.
enum Reconciled {
    /// Our block is the node's frontier or somewhere in the account chain.
    Applied { is_frontier: bool },
    /// The node still sits on our block's previous.
    Unchanged,
    /// Another block took our place.
    Moved,
    /// The node could not be asked.
    Unknown,
}

type AccountLocks = Arc<Mutex<HashMap<Address, Arc<Mutex<()>>>>>;

struct PipelineInner {
    node: Arc<dyn NodeClient>,
    work: Arc<dyn WorkProvider>,
    signer: Arc<dyn Signer>,
    receivables: Arc<ReceivableBook>,
    thresholds: WorkThresholds,
    config: WalletConfig,
    account_locks: AccountLocks,
}

/// Drives blocks from intent to a terminal state.
#[derive(Clone)]
pub struct SubmissionPipeline {
    inner: Arc<PipelineInner>,
}

impl SubmissionPipeline {
    pub fn new(
        node: Arc<dyn NodeClient>,
        work: Arc<dyn WorkProvider>,
        signer: Arc<dyn Signer>,
        receivables: Arc<ReceivableBook>,
        config: WalletConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                node,
                work,
                signer,
                receivables,
                thresholds: WorkThresholds::for_network(config.network),
                config,
                account_locks: Arc::new(Mutex::new(HashMap::new())),
            }),
        }
    }

    pub fn node(&self) -> &Arc<dyn NodeClient> {
        &self.inner.node
    }

    pub fn config(&self) -> &WalletConfig {
        &self.inner.config
    }

    pub fn receivables(&self) -> &Arc<ReceivableBook> {
        &self.inner.receivables
    }

    /// Build, sign and submit the next block for the account in `cell`.
    ///
    /// Returns the confirmed block. Waits for any submission already in
    /// flight on the same account first.
    pub async fn submit(
        &self,
        cell: Arc<AccountCell>,
        intent: Intent,
    ) -> Result<SignedBlock, WalletError> {
        let address = cell.snapshot().await.address.clone();
        let lock = self.account_lock(&address).await;
        let guard = lock.lock_owned().await;

        let prepared = self.prepare(&cell, &intent).await;
        let signed = match prepared {
            Ok(signed) => signed,
            Err(e) => {
                drop(guard);
                self.cleanup_locks().await;
                return Err(e);
            }
        };

        debug!(
            account = %address,
            hash = %signed.hash,
            stage = %SubmissionStage::Submitted,
            "submitting block"
        );
        let inner = self.inner.clone();
        let receivable = match intent {
            Intent::Receive { receivable, .. } => Some(receivable),
            _ => None,
        };
        let handle = tokio::spawn(async move {
            let result = inner.drive(&cell, &signed, receivable.as_ref()).await;
            inner.finish(guard, &signed, &result).await;
            result
        });
        handle
            .await
            .map_err(|e| WalletError::Aborted(e.to_string()))?
    }

    /// Stages `Built` through `Signed`; runs under the account lock.
    async fn prepare(
        &self,
        cell: &AccountCell,
        intent: &Intent,
    ) -> Result<SignedBlock, WalletError> {
        let inner = &self.inner;
        if let Intent::Receive { receivable, .. } = intent {
            if inner.receivables.is_received(&receivable.source_hash).await {
                debug!(source = %receivable.source_hash, "receivable already received");
                return Err(WalletError::Rejected(RejectReason::AlreadyReceived));
            }
        }

        let state = cell.snapshot().await;
        let now = inner.node.now().await?;
        let network = inner.config.network;
        let block = match intent {
            Intent::Send {
                recipient,
                amount,
                representative,
            } => build_send(
                &state,
                network,
                recipient,
                *amount,
                representative.as_ref(),
                now,
            )?,
            Intent::Receive {
                receivable,
                representative,
            } => build_receive(&state, network, receivable, representative.as_ref(), now)?,
            Intent::Change { representative } => {
                build_change(&state, network, representative, now)?
            }
        };
        let hash = block.hash();
        debug!(
            account = %state.address,
            kind = ?block.kind,
            height = block.height.value(),
            %hash,
            stage = %SubmissionStage::Built,
            "block built"
        );

        let work = inner.request_work(&block).await?;
        let signature = inner.signer.sign(state.index, &hash).await?;
        debug!(%hash, stage = %SubmissionStage::Signed, "block signed");
        Ok(SignedBlock::new(block, signature, work))
    }

    async fn account_lock(&self, address: &Address) -> Arc<Mutex<()>> {
        let mut locks = self.inner.account_locks.lock().await;
        locks
            .entry(address.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn cleanup_locks(&self) {
        self.inner.cleanup_locks().await;
    }

    /// Number of accounts with a lock entry; idle entries are cleaned up
    /// after every submission.
    pub async fn active_accounts(&self) -> usize {
        self.inner.account_locks.lock().await.len()
    }
}

impl PipelineInner {
    async fn request_work(&self, block: &Block) -> Result<u64, WalletError> {
        let target = work_target(block)?;
        let threshold = self.thresholds.threshold_for(block.kind);
        let attempts = self.config.work_attempts;
        let mut reason = String::new();

        for attempt in 1..=attempts {
            debug!(
                account = %block.account,
                attempt,
                stage = %SubmissionStage::WorkRequested,
                "requesting work"
            );
            match tokio::time::timeout(
                self.config.work_timeout(),
                self.work.generate(target, threshold),
            )
            .await
            {
                Ok(Ok(nonce)) => return Ok(nonce),
                Ok(Err(e)) => reason = e.to_string(),
                Err(_) => reason = "work request timed out".to_string(),
            }
            warn!(account = %block.account, attempt, %reason, "work request failed");
        }
        Err(WalletError::WorkUnavailable { attempts, reason })
    }

    /// Stage `Submitted` until a terminal answer.
    async fn drive(
        &self,
        cell: &AccountCell,
        signed: &SignedBlock,
        receivable: Option<&Receivable>,
    ) -> Result<SignedBlock, WalletError> {
        let address = signed.account().clone();
        let attempts = self.config.submit_attempts;

        for attempt in 1..=attempts {
            let answer =
                match tokio::time::timeout(self.config.submit_timeout(), self.node.submit(signed))
                    .await
                {
                    Ok(answer) => answer,
                    Err(_) => Err(lattice_client::ClientError::Timeout),
                };

            match answer {
                Ok(SubmitOutcome::Accepted)
                | Ok(SubmitOutcome::Rejected(RejectReason::AlreadyApplied)) => {
                    self.confirm(cell, signed, receivable, true).await;
                    return Ok(signed.clone());
                }
                Ok(SubmitOutcome::Rejected(RejectReason::StalePrevious)) => {
                    self.resync(cell).await;
                    return Err(WalletError::StalePrevious(address));
                }
                Ok(SubmitOutcome::Rejected(reason)) => {
                    return Err(WalletError::Rejected(reason));
                }
                Err(e) if e.is_transient() => {
                    debug!(account = %address, attempt, error = %e, "submit unanswered");
                }
                Err(e) => return Err(e.into()),
            }

            match self.reconcile(signed).await {
                Reconciled::Applied { is_frontier } => {
                    info!(
                        account = %address,
                        hash = %signed.hash,
                        "block applied despite lost answer"
                    );
                    self.confirm(cell, signed, receivable, is_frontier).await;
                    return Ok(signed.clone());
                }
                Reconciled::Moved => {
                    self.resync(cell).await;
                    return Err(WalletError::Superseded(address));
                }
                Reconciled::Unchanged | Reconciled::Unknown => {}
            }

            if attempt < attempts {
                let delay = self.config.backoff(attempt - 1);
                debug!(
                    account = %address,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "resubmitting"
                );
                tokio::time::sleep(delay).await;
            }
        }
        Err(WalletError::NetworkTimeout)
    }

    /// Ask the node whether `signed` landed after an unanswered submit.
    async fn reconcile(&self, signed: &SignedBlock) -> Reconciled {
        let info = match self.node.account(signed.account()).await {
            Ok(info) => info,
            Err(e) => {
                warn!(account = %signed.account(), error = %e, "account query failed");
                return Reconciled::Unknown;
            }
        };
        let frontier = info.as_ref().map(|info| info.frontier);
        if frontier == Some(signed.hash) {
            return Reconciled::Applied { is_frontier: true };
        }
        if frontier == signed.block.previous {
            return Reconciled::Unchanged;
        }
        match self.node.block(&signed.hash).await {
            Ok(Some(_)) => Reconciled::Applied { is_frontier: false },
            Ok(None) => Reconciled::Moved,
            Err(e) => {
                warn!(hash = %signed.hash, error = %e, "block query failed");
                Reconciled::Unknown
            }
        }
    }

    /// Apply a confirmed block to the account and its receivables.
    async fn confirm(
        &self,
        cell: &AccountCell,
        signed: &SignedBlock,
        receivable: Option<&Receivable>,
        is_frontier: bool,
    ) {
        let current = cell.snapshot().await;
        if is_frontier && current.is_extended_by(signed) {
            cell.replace(current.apply(signed)).await;
        } else {
            self.resync(cell).await;
        }
        if let Some(receivable) = receivable {
            self.receivables.mark_received(receivable).await;
        }

        if let Ok(used) = work_target(&signed.block) {
            let next = WorkTarget::from(signed.hash);
            let next_threshold = self.thresholds.threshold_for(BlockKind::Send);
            self.work.on_confirmed(used, next, next_threshold).await;
        }

        info!(
            account = %signed.account(),
            kind = ?signed.block.kind,
            height = signed.height().value(),
            balance = signed.block.balance.raw(),
            hash = %signed.hash,
            "block confirmed"
        );
    }

    /// Replace the local snapshot with the node's view of the account.
    async fn resync(&self, cell: &AccountCell) {
        let current = cell.snapshot().await;
        match self.node.account(&current.address).await {
            Ok(info) => {
                let state = AccountState::from_node(current.index, current.address.clone(), info);
                debug!(
                    account = %state.address,
                    height = state.height.value(),
                    "account resynchronized"
                );
                cell.replace(state).await;
            }
            Err(e) => warn!(account = %current.address, error = %e, "resync failed"),
        }
    }

    async fn finish(
        &self,
        guard: OwnedMutexGuard<()>,
        signed: &SignedBlock,
        result: &Result<SignedBlock, WalletError>,
    ) {
        let stage = SubmissionStage::terminal_for(result);
        match result {
            Ok(_) => debug!(hash = %signed.hash, %stage, "submission finished"),
            Err(e) => warn!(
                account = %signed.account(),
                hash = %signed.hash,
                %stage,
                error = %e,
                "submission failed"
            ),
        }
        drop(guard);
        self.cleanup_locks().await;
    }

    async fn cleanup_locks(&self) {
        let mut locks = self.account_locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}
