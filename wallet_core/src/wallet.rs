//! The wallet façade: a set of derived accounts plus everything needed to
//! issue blocks for them and follow their ledger activity.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex, OnceLock, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use lattice_client::NodeClient;
use lattice_types::{AccountEntry, Address, Amount, KeyIndex, Receivable, Seed, SignedBlock};
use lattice_work::WorkProvider;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

use crate::account::{AccountCell, AccountState};
use crate::account_monitor::AccountMonitor;
use crate::auto_receiver::{AutoReceiver, AutoReceiverSettings, ReceiveTarget, RepresentativeProvider};
use crate::pipeline::{Intent, SubmissionPipeline};
use crate::receivable::ReceivableBook;
use crate::repository::{AccountEntryRepository, TransactionRepository};
use crate::signer::{SeedSigner, Signer};
use crate::subscription::SubscriptionHandle;
use crate::task::TaskHandle;
use crate::transaction_monitor::{AccountEntryMonitor, TransactionMonitor};
use crate::{WalletConfig, WalletError};

struct WalletInner {
    signer: Arc<dyn Signer>,
    pipeline: SubmissionPipeline,
    config: WalletConfig,
    accounts: RwLock<BTreeMap<KeyIndex, Arc<AccountCell>>>,
    membership: watch::Sender<Vec<Address>>,
    monitor: AccountMonitor,
    transactions: OnceLock<TransactionMonitor>,
    entries: OnceLock<AccountEntryMonitor>,
    polling: StdMutex<Option<TaskHandle>>,
    auto_receiver: StdMutex<Option<AutoReceiver>>,
}

/// Handle to a wallet. Clones share the same accounts.
#[derive(Clone)]
pub struct Wallet {
    inner: Arc<WalletInner>,
}

impl Wallet {
    /// Fails with [`WalletError::Config`] when `config` does not validate.
    pub fn new(
        signer: Arc<dyn Signer>,
        node: Arc<dyn NodeClient>,
        work: Arc<dyn WorkProvider>,
        config: WalletConfig,
    ) -> Result<Self, WalletError> {
        config.validate()?;
        let receivables = Arc::new(ReceivableBook::new());
        let monitor = AccountMonitor::new(node.clone(), config.poll_interval());
        let pipeline =
            SubmissionPipeline::new(node, work, signer.clone(), receivables, config.clone());
        let (membership, _) = watch::channel(Vec::new());
        Ok(Self {
            inner: Arc::new(WalletInner {
                signer,
                pipeline,
                config,
                accounts: RwLock::new(BTreeMap::new()),
                membership,
                monitor,
                transactions: OnceLock::new(),
                entries: OnceLock::new(),
                polling: StdMutex::new(None),
                auto_receiver: StdMutex::new(None),
            }),
        })
    }

    /// A wallet signing for every index derived from `seed`.
    pub fn from_seed(
        seed: Seed,
        node: Arc<dyn NodeClient>,
        work: Arc<dyn WorkProvider>,
        config: WalletConfig,
    ) -> Result<Self, WalletError> {
        Self::new(Arc::new(SeedSigner::new(seed)), node, work, config)
    }

    pub fn from_mnemonic(
        phrase: &str,
        passphrase: &str,
        node: Arc<dyn NodeClient>,
        work: Arc<dyn WorkProvider>,
        config: WalletConfig,
    ) -> Result<Self, WalletError> {
        let signer = SeedSigner::from_mnemonic(phrase, passphrase)?;
        Self::new(Arc::new(signer), node, work, config)
    }

    pub fn config(&self) -> &WalletConfig {
        &self.inner.config
    }

    pub fn node(&self) -> &Arc<dyn NodeClient> {
        self.inner.pipeline.node()
    }

    /// The account monitor that always follows this wallet's accounts.
    pub fn monitor(&self) -> &AccountMonitor {
        &self.inner.monitor
    }

    pub fn receivables(&self) -> &Arc<ReceivableBook> {
        self.inner.pipeline.receivables()
    }

    // ── Accounts ────────────────────────────────────────────────────────

    /// Derive the address at `index`; the account need not be open.
    pub fn address(&self, index: KeyIndex) -> Result<Address, WalletError> {
        self.inner.signer.address(index)
    }

    /// Start tracking `index`, loading its current state from the node.
    pub async fn open_account(&self, index: KeyIndex) -> Result<Arc<AccountState>, WalletError> {
        let mut opened = self.open_accounts([index]).await?;
        opened
            .pop()
            .ok_or_else(|| WalletError::InvalidIndex(index.to_string()))
    }

    /// Open several accounts at once. Nothing is opened if any index is
    /// invalid or already open.
    pub async fn open_accounts(
        &self,
        indexes: impl IntoIterator<Item = KeyIndex>,
    ) -> Result<Vec<Arc<AccountState>>, WalletError> {
        let mut wanted: Vec<(KeyIndex, Address)> = Vec::new();
        {
            let accounts = self.inner.accounts.read().await;
            for index in indexes {
                if accounts.contains_key(&index) || wanted.iter().any(|(i, _)| *i == index) {
                    return Err(WalletError::AlreadyOpen(index));
                }
                wanted.push((index, self.address(index)?));
            }
        }

        let node = self.node();
        let infos = try_join_all(wanted.iter().map(|(_, address)| node.account(address))).await?;

        let mut opened = Vec::with_capacity(wanted.len());
        {
            let mut accounts = self.inner.accounts.write().await;
            if let Some((index, _)) = wanted.iter().find(|(i, _)| accounts.contains_key(i)) {
                return Err(WalletError::AlreadyOpen(*index));
            }
            for ((index, address), info) in wanted.into_iter().zip(infos) {
                let state = Arc::new(AccountState::from_node(index, address, info));
                debug!(
                    index = index.value(),
                    account = %state.address,
                    height = state.height.value(),
                    "opened account"
                );
                accounts.insert(index, Arc::new(AccountCell::new((*state).clone())));
                opened.push(state);
            }
        }

        for state in &opened {
            self.inner.monitor.watch(state.address.clone()).await;
        }
        self.inner.publish_membership().await;
        Ok(opened)
    }

    /// Open every index in `from..=to`.
    pub async fn open_account_range(
        &self,
        from: KeyIndex,
        to: KeyIndex,
    ) -> Result<Vec<Arc<AccountState>>, WalletError> {
        if from > to {
            return Err(WalletError::InvalidIndex(format!("empty range {from}..={to}")));
        }
        self.open_accounts((from.value()..=to.value()).map(KeyIndex::new))
            .await
    }

    /// Stop tracking `index`. Blocks already in flight still complete.
    pub async fn close_account(&self, index: KeyIndex) -> Result<(), WalletError> {
        let cell = self
            .inner
            .accounts
            .write()
            .await
            .remove(&index)
            .ok_or(WalletError::AccountNotOpen(index))?;
        let address = cell.snapshot().await.address.clone();
        self.inner.monitor.unwatch(&address).await;
        self.receivables().forget(&address).await;
        self.inner.publish_membership().await;
        debug!(index = index.value(), account = %address, "closed account");
        Ok(())
    }

    pub async fn is_open(&self, index: KeyIndex) -> bool {
        self.inner.accounts.read().await.contains_key(&index)
    }

    /// Current local state of an open account.
    pub async fn account(&self, index: KeyIndex) -> Result<Arc<AccountState>, WalletError> {
        Ok(self.inner.cell(index).await?.snapshot().await)
    }

    pub async fn account_by_address(&self, address: &Address) -> Option<Arc<AccountState>> {
        let cell = self.inner.cell_by_address(address).await?;
        Some(cell.snapshot().await)
    }

    /// Addresses of the open accounts, in index order.
    pub async fn addresses(&self) -> Vec<Address> {
        self.inner.addresses().await
    }

    /// Follows the set of open addresses.
    pub fn membership(&self) -> watch::Receiver<Vec<Address>> {
        self.inner.membership.subscribe()
    }

    /// Reload an account's state from the node, discarding the local view.
    pub async fn refresh(&self, index: KeyIndex) -> Result<Arc<AccountState>, WalletError> {
        let cell = self.inner.cell(index).await?;
        let address = cell.snapshot().await.address.clone();
        let info = self.node().account(&address).await?;
        cell.replace(AccountState::from_node(index, address, info))
            .await;
        Ok(cell.snapshot().await)
    }

    // ── Blocks ──────────────────────────────────────────────────────────

    /// Send `amount` from `index` to `recipient` and wait for confirmation.
    pub async fn send(
        &self,
        index: KeyIndex,
        recipient: Address,
        amount: Amount,
        representative: Option<Address>,
    ) -> Result<SignedBlock, WalletError> {
        let cell = self.inner.cell(index).await?;
        let block = self
            .inner
            .pipeline
            .submit(
                cell,
                Intent::Send {
                    recipient,
                    amount,
                    representative,
                },
            )
            .await?;
        info!(
            index = index.value(),
            hash = %block.hash,
            height = block.height().value(),
            "send confirmed"
        );
        Ok(block)
    }

    /// Receive `receivable` into the wallet account it was sent to.
    ///
    /// `representative` is required when the receive opens the account.
    pub async fn receive(
        &self,
        receivable: Receivable,
        representative: Option<Address>,
    ) -> Result<SignedBlock, WalletError> {
        self.inner.receive(receivable, representative).await
    }

    /// Point `index` at a new representative.
    pub async fn change(
        &self,
        index: KeyIndex,
        representative: Address,
    ) -> Result<SignedBlock, WalletError> {
        let cell = self.inner.cell(index).await?;
        self.inner
            .pipeline
            .submit(cell, Intent::Change { representative })
            .await
    }

    /// Receivables the node reports for `index` that the wallet has not
    /// received yet.
    pub async fn pending(
        &self,
        index: KeyIndex,
        min_amount: Amount,
    ) -> Result<Vec<Receivable>, WalletError> {
        let address = self.account(index).await?.address.clone();
        let found = self.node().receivables(&address, min_amount).await?;
        self.receivables().record(found).await;
        Ok(self.receivables().unreceived(&address, min_amount).await)
    }

    // ── Monitoring ──────────────────────────────────────────────────────

    /// Keep `monitor` watching exactly the wallet's open addresses.
    ///
    /// Addresses already open are watched before this returns. The binding
    /// lasts until the handle is stopped or dropped; addresses it added stay
    /// watched afterwards.
    pub async fn bind_to(&self, monitor: &AccountMonitor) -> TaskHandle {
        let mut membership = self.membership();
        let mut bound = HashSet::new();
        let current = membership.borrow_and_update().clone();
        follow(monitor, &mut bound, current).await;

        let monitor = monitor.clone();
        TaskHandle::spawn(move |mut shutdown_rx| async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    changed = membership.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let current = membership.borrow_and_update().clone();
                        follow(&monitor, &mut bound, current).await;
                    }
                }
            }
        })
    }

    /// Poll the wallet's own monitor in the background. Calling it again
    /// while polling is a no-op.
    pub fn start_monitoring(&self) {
        let mut polling = self
            .inner
            .polling
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if polling.as_ref().map_or(true, TaskHandle::is_finished) {
            *polling = Some(self.inner.monitor.start());
        }
    }

    /// Receive incoming sends of at least `min_amount` automatically.
    ///
    /// Replaces any auto-receiver already running. `monitor` changes trigger
    /// an immediate pass; otherwise passes run every `retry_interval`, which
    /// must be positive.
    pub fn enable_auto_receiver(
        &self,
        monitor: &AccountMonitor,
        min_amount: Amount,
        retry_interval: Duration,
        representative: RepresentativeProvider,
    ) -> Result<(), WalletError> {
        if retry_interval.is_zero() {
            return Err(WalletError::Config(
                "auto-receive interval must be positive".into(),
            ));
        }
        let target: Arc<dyn ReceiveTarget> = self.inner.clone();
        let receiver = AutoReceiver::spawn(
            Arc::downgrade(&target),
            monitor,
            self.receivables().clone(),
            AutoReceiverSettings {
                min_amount,
                interval: retry_interval,
                representative,
            },
        );
        info!(min_amount = min_amount.raw(), "auto-receive enabled");
        *self
            .inner
            .auto_receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(receiver);
        Ok(())
    }

    pub async fn disable_auto_receiver(&self) {
        let receiver = self
            .inner
            .auto_receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(receiver) = receiver {
            receiver.stop().await;
            info!("auto-receive disabled");
        }
    }

    /// Every confirmed block of the open accounts, from their open block on.
    pub fn on_transaction(
        &self,
        on_event: impl Fn(&SignedBlock) -> Result<(), WalletError> + Send + Sync + 'static,
        on_error: impl Fn(&WalletError) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.inner
            .transactions
            .get_or_init(|| TransactionMonitor::new(&self.inner.monitor))
            .subscribe(on_event, on_error)
    }

    /// Like [`Wallet::on_transaction`], with balances before and after.
    pub fn on_account_entry(
        &self,
        on_event: impl Fn(&AccountEntry) -> Result<(), WalletError> + Send + Sync + 'static,
        on_error: impl Fn(&WalletError) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.inner
            .entries
            .get_or_init(|| AccountEntryMonitor::new(&self.inner.monitor))
            .subscribe(on_event, on_error)
    }

    /// Like [`Wallet::on_transaction`], but every block is saved to
    /// `repository` before delivery and each account resumes after its last
    /// saved block. The feed lives as long as the returned handle.
    pub fn on_transaction_with_repository(
        &self,
        repository: Arc<TransactionRepository>,
        on_event: impl Fn(&SignedBlock) -> Result<(), WalletError> + Send + Sync + 'static,
        on_error: impl Fn(&WalletError) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        let feed = TransactionMonitor::with_repository(&self.inner.monitor, repository);
        let handle = feed.subscribe(on_event, on_error);
        handle.retain(feed)
    }

    pub fn on_account_entry_with_repository(
        &self,
        repository: Arc<AccountEntryRepository>,
        on_event: impl Fn(&AccountEntry) -> Result<(), WalletError> + Send + Sync + 'static,
        on_error: impl Fn(&WalletError) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        let feed = AccountEntryMonitor::with_repository(&self.inner.monitor, repository);
        let handle = feed.subscribe(on_event, on_error);
        handle.retain(feed)
    }

    /// Stop the background loops this wallet started.
    pub async fn shutdown(&self) {
        self.disable_auto_receiver().await;
        let polling = self
            .inner
            .polling
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(polling) = polling {
            polling.stop().await;
        }
    }
}

async fn follow(monitor: &AccountMonitor, bound: &mut HashSet<Address>, current: Vec<Address>) {
    let current: HashSet<Address> = current.into_iter().collect();
    for gone in bound.difference(&current) {
        monitor.unwatch(gone).await;
    }
    for added in current.difference(bound) {
        monitor.watch(added.clone()).await;
    }
    *bound = current;
}

impl WalletInner {
    async fn cell(&self, index: KeyIndex) -> Result<Arc<AccountCell>, WalletError> {
        self.accounts
            .read()
            .await
            .get(&index)
            .cloned()
            .ok_or(WalletError::AccountNotOpen(index))
    }

    async fn cell_by_address(&self, address: &Address) -> Option<Arc<AccountCell>> {
        let cells: Vec<Arc<AccountCell>> = self.accounts.read().await.values().cloned().collect();
        for cell in cells {
            if &cell.snapshot().await.address == address {
                return Some(cell);
            }
        }
        None
    }

    async fn addresses(&self) -> Vec<Address> {
        let cells: Vec<Arc<AccountCell>> = self.accounts.read().await.values().cloned().collect();
        let mut addresses = Vec::with_capacity(cells.len());
        for cell in cells {
            addresses.push(cell.snapshot().await.address.clone());
        }
        addresses
    }

    async fn publish_membership(&self) {
        let addresses = self.addresses().await;
        self.membership.send_replace(addresses);
    }
}

#[async_trait]
impl ReceiveTarget for WalletInner {
    async fn receiving_addresses(&self) -> Vec<Address> {
        self.addresses().await
    }

    async fn receive(
        &self,
        receivable: Receivable,
        representative: Option<Address>,
    ) -> Result<SignedBlock, WalletError> {
        let cell = self
            .cell_by_address(&receivable.receiver)
            .await
            .ok_or_else(|| {
                WalletError::NotFound(format!("{} is not a wallet account", receivable.receiver))
            })?;
        self.pipeline
            .submit(
                cell,
                Intent::Receive {
                    receivable,
                    representative,
                },
            )
            .await
    }
}
