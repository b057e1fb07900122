//! Confirmed transactions and ledger entries, delivered exactly once.
//!
//! Both monitors follow an [`AccountMonitor`]. For every account they keep
//! the next height to deliver and the highest height reported so far; a
//! change event fetches all blocks in between, so listeners see each block
//! once and in height order even when change events are coalesced or
//! repeated. Heights that could not be fetched are retried on every poll
//! interval until the account has caught up.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lattice_client::NodeClient;
use lattice_types::{AccountEntry, Address, Amount, Height, Link, SignedBlock};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::account_monitor::{AccountChanged, AccountMonitor};
use crate::repository::{
    resume_height, AccountEntryRepository, HistoryRepository, Recorded, TransactionRepository,
};
use crate::subscription::{ListenerSet, SubscriptionHandle};
use crate::task::TaskHandle;
use crate::WalletError;

/// First height to deliver for an address seen for the first time.
pub type HeightProvider = Arc<dyn Fn(&Address) -> Height + Send + Sync>;

const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(1);

fn from_open() -> HeightProvider {
    Arc::new(|_: &Address| Height::OPEN)
}

/// Turns a confirmed block into what listeners receive.
#[async_trait]
trait Render: Send + Sync + 'static {
    type Item: Recorded + Clone + Send + Sync + 'static;

    async fn render(
        &self,
        node: &dyn NodeClient,
        block: SignedBlock,
    ) -> Result<Self::Item, WalletError>;
}

struct Blocks;

#[async_trait]
impl Render for Blocks {
    type Item = SignedBlock;

    async fn render(
        &self,
        _: &dyn NodeClient,
        block: SignedBlock,
    ) -> Result<SignedBlock, WalletError> {
        Ok(block)
    }
}

struct Entries;

#[async_trait]
impl Render for Entries {
    type Item = AccountEntry;

    async fn render(
        &self,
        node: &dyn NodeClient,
        signed: SignedBlock,
    ) -> Result<AccountEntry, WalletError> {
        let block = &signed.block;
        let previous_balance = match block.height.value().checked_sub(1) {
            Some(0) | None => Amount::ZERO,
            Some(previous) => node
                .block_at(&block.account, Height::new(previous))
                .await?
                .map(|previous| previous.block.balance)
                .ok_or_else(|| {
                    WalletError::NotFound(format!("{} at height {previous}", block.account))
                })?,
        };
        let subject = match &block.link {
            Link::Destination(destination) => destination.clone(),
            Link::Source(source) => match node.block(source).await? {
                Some(source) => source.block.account,
                // Only the genesis open block has no source on the ledger.
                None if block.height == Height::OPEN => block.account.clone(),
                None => return Err(WalletError::NotFound(format!("source block {source}"))),
            },
            Link::None => block.representative.clone(),
        };
        Ok(AccountEntry {
            hash: signed.hash,
            address: block.account.clone(),
            height: block.height,
            kind: block.kind,
            subject,
            previous_balance,
            balance: block.balance,
            timestamp: block.timestamp,
        })
    }
}

/// Where delivery starts for an address seen for the first time.
enum Start<T> {
    Provider(HeightProvider),
    /// After the last saved item; every item is saved before it is emitted.
    Repository(Arc<dyn HistoryRepository<T>>),
}

/// Delivery state of one account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Progress {
    /// Unknown until the start height was resolved.
    next: Option<Height>,
    /// Highest height the account monitor reported.
    target: Height,
}

impl Progress {
    fn is_behind(&self) -> bool {
        self.next.map_or(true, |next| next <= self.target)
    }
}

struct Deliverer<R: Render> {
    node: Arc<dyn NodeClient>,
    render: R,
    listeners: Arc<ListenerSet<R::Item>>,
    start: Start<R::Item>,
}

impl<R: Render> Deliverer<R> {
    async fn start_height(&self, address: &Address) -> Result<Height, WalletError> {
        match &self.start {
            Start::Provider(provider) => Ok(provider(address)),
            Start::Repository(repository) => resume_height(&**repository, address).await,
        }
    }

    async fn fetch(&self, address: &Address, height: Height) -> Result<R::Item, WalletError> {
        let block = self
            .node
            .block_at(address, height)
            .await?
            .ok_or_else(|| WalletError::NotFound(format!("{address} at height {height}")))?;
        let item = self.render.render(&*self.node, block).await?;
        if let Start::Repository(repository) = &self.start {
            repository.save(item.clone()).await?;
        }
        Ok(item)
    }

    /// Deliver every height up to `progress.target`, stopping at the first
    /// failure. `progress.next` only moves past delivered heights.
    async fn advance(&self, address: &Address, progress: &mut Progress) {
        let mut height = match progress.next {
            Some(next) => next,
            None => match self.start_height(address).await {
                Ok(start) => {
                    progress.next = Some(start);
                    start
                }
                Err(e) => {
                    warn!(account = %address, error = %e, "cannot resolve start height");
                    self.listeners.emit_error(&e);
                    return;
                }
            },
        };
        while height <= progress.target {
            match self.fetch(address, height).await {
                Ok(item) => {
                    debug!(account = %address, %height, "delivering block");
                    self.listeners.emit(&item);
                    height = height.next();
                    progress.next = Some(height);
                }
                Err(e) => {
                    warn!(account = %address, %height, error = %e, "block delivery failed");
                    self.listeners.emit_error(&e);
                    break;
                }
            }
        }
    }
}

/// Shared delivery machinery of the two monitors.
struct Feed<R: Render> {
    listeners: Arc<ListenerSet<R::Item>>,
    _source: SubscriptionHandle,
    _task: TaskHandle,
}

impl<R: Render> Feed<R> {
    fn new(monitor: &AccountMonitor, start: Start<R::Item>, render: R) -> Self {
        let listeners = Arc::new(ListenerSet::new());
        let (tx, mut rx) = mpsc::unbounded_channel::<AccountChanged>();
        let source = monitor.subscribe(
            move |event| {
                tx.send(event.clone())
                    .map_err(|_| WalletError::Listener("monitor feed closed".into()))
            },
            {
                let listeners = listeners.clone();
                move |error| listeners.emit_error(error)
            },
        );

        let deliverer = Deliverer {
            node: monitor.node().clone(),
            render,
            listeners: listeners.clone(),
            start,
        };
        let retry_interval = monitor.poll_interval().max(MIN_RETRY_INTERVAL);
        let task = TaskHandle::spawn(move |mut shutdown_rx| async move {
            let mut progress: HashMap<Address, Progress> = HashMap::new();
            let mut retry = tokio::time::interval(retry_interval);
            retry.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    event = rx.recv() => {
                        let Some(event) = event else { break };
                        let account = progress.entry(event.address.clone()).or_insert(Progress {
                            next: None,
                            target: event.height,
                        });
                        account.target = account.target.max(event.height);
                        deliverer.advance(&event.address, account).await;
                    }
                    _ = retry.tick() => {
                        for (address, account) in progress.iter_mut() {
                            if account.is_behind() {
                                debug!(account = %address, up_to = %account.target, "retrying delivery");
                                deliverer.advance(address, account).await;
                            }
                        }
                    }
                }
            }
        });

        Self {
            listeners,
            _source: source,
            _task: task,
        }
    }
}

/// Delivers every confirmed block of the monitored accounts.
pub struct TransactionMonitor {
    feed: Feed<Blocks>,
}

impl TransactionMonitor {
    pub fn new(monitor: &AccountMonitor) -> Self {
        Self::with_height_provider(monitor, from_open())
    }

    pub fn with_height_provider(monitor: &AccountMonitor, height_provider: HeightProvider) -> Self {
        Self {
            feed: Feed::new(monitor, Start::Provider(height_provider), Blocks),
        }
    }

    /// Save every block to `repository` before delivering it and resume each
    /// account after its last saved block.
    pub fn with_repository(
        monitor: &AccountMonitor,
        repository: Arc<TransactionRepository>,
    ) -> Self {
        Self {
            feed: Feed::new(monitor, Start::Repository(repository), Blocks),
        }
    }

    pub fn subscribe(
        &self,
        on_event: impl Fn(&SignedBlock) -> Result<(), WalletError> + Send + Sync + 'static,
        on_error: impl Fn(&WalletError) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.feed.listeners.subscribe(on_event, on_error)
    }
}

/// Delivers confirmed blocks as balance-annotated ledger entries.
pub struct AccountEntryMonitor {
    feed: Feed<Entries>,
}

impl AccountEntryMonitor {
    pub fn new(monitor: &AccountMonitor) -> Self {
        Self::with_height_provider(monitor, from_open())
    }

    pub fn with_height_provider(monitor: &AccountMonitor, height_provider: HeightProvider) -> Self {
        Self {
            feed: Feed::new(monitor, Start::Provider(height_provider), Entries),
        }
    }

    pub fn with_repository(
        monitor: &AccountMonitor,
        repository: Arc<AccountEntryRepository>,
    ) -> Self {
        Self {
            feed: Feed::new(monitor, Start::Repository(repository), Entries),
        }
    }

    pub fn subscribe(
        &self,
        on_event: impl Fn(&AccountEntry) -> Result<(), WalletError> + Send + Sync + 'static,
        on_error: impl Fn(&WalletError) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.feed.listeners.subscribe(on_event, on_error)
    }
}
