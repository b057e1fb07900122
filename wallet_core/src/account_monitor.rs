//! Frontier polling with one event per block.
//!
//! Each watched address has a cursor: the last height an event was emitted
//! for. A poll that finds the frontier ahead of the cursor walks every
//! height in between, so a jump from 3 to 6 yields events for 4, 5 and 6.
//! The cursor only moves past heights that were emitted; a failed walk
//! resumes from the same place on the next poll.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use lattice_client::NodeClient;
use lattice_types::{Address, BlockHash, Height};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::subscription::{ListenerSet, SubscriptionHandle};
use crate::task::TaskHandle;
use crate::WalletError;

/// An account gained the block `hash` at `height`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountChanged {
    pub address: Address,
    pub height: Height,
    pub hash: BlockHash,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cursor {
    /// Adopt whatever height the next poll reports, without events.
    Baseline,
    /// Events were emitted up to and including this height.
    Seen(Height),
}

/// Chooses where a newly watched address starts. `None` means "from the
/// current frontier", `Some(h)` means "emit every block from height `h`".
pub type StartHeight = Arc<dyn Fn(&Address) -> Option<Height> + Send + Sync>;

struct MonitorInner {
    node: Arc<dyn NodeClient>,
    poll_interval: Duration,
    start_height: StartHeight,
    cursors: Mutex<HashMap<Address, Cursor>>,
    poll_lock: Mutex<()>,
    listeners: ListenerSet<AccountChanged>,
}

#[derive(Clone)]
pub struct AccountMonitor {
    inner: Arc<MonitorInner>,
}

impl AccountMonitor {
    pub fn new(node: Arc<dyn NodeClient>, poll_interval: Duration) -> Self {
        Self::with_start_height(node, poll_interval, Arc::new(|_: &Address| None))
    }

    pub fn with_start_height(
        node: Arc<dyn NodeClient>,
        poll_interval: Duration,
        start_height: StartHeight,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                node,
                poll_interval,
                start_height,
                cursors: Mutex::new(HashMap::new()),
                poll_lock: Mutex::new(()),
                listeners: ListenerSet::new(),
            }),
        }
    }

    pub fn node(&self) -> &Arc<dyn NodeClient> {
        &self.inner.node
    }

    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    /// Start watching `address`. Watching it again keeps its cursor.
    pub async fn watch(&self, address: Address) {
        let cursor = match (self.inner.start_height)(&address) {
            Some(from) => Cursor::Seen(Height::new(from.value().saturating_sub(1))),
            None => Cursor::Baseline,
        };
        let mut cursors = self.inner.cursors.lock().await;
        if !cursors.contains_key(&address) {
            debug!(account = %address, "watching account");
            cursors.insert(address, cursor);
        }
    }

    pub async fn unwatch(&self, address: &Address) {
        if self.inner.cursors.lock().await.remove(address).is_some() {
            debug!(account = %address, "stopped watching account");
        }
    }

    pub async fn watched(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> =
            self.inner.cursors.lock().await.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    /// Last height an event was emitted for, if the address has a baseline.
    pub async fn last_seen(&self, address: &Address) -> Option<Height> {
        match self.inner.cursors.lock().await.get(address) {
            Some(Cursor::Seen(height)) => Some(*height),
            _ => None,
        }
    }

    pub fn subscribe(
        &self,
        on_event: impl Fn(&AccountChanged) -> Result<(), WalletError> + Send + Sync + 'static,
        on_error: impl Fn(&WalletError) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.inner.listeners.subscribe(on_event, on_error)
    }

    /// Run one polling cycle; returns the number of events emitted.
    pub async fn poll_once(&self) -> Result<usize, WalletError> {
        self.inner.poll_once().await
    }

    /// Poll on the configured interval until the handle is stopped.
    pub fn start(&self) -> TaskHandle {
        let inner = self.inner.clone();
        TaskHandle::spawn(move |mut shutdown_rx| async move {
            let mut interval = tokio::time::interval(inner.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        debug!("account monitor stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(e) = inner.poll_once().await {
                            warn!(error = %e, "account poll failed");
                        }
                    }
                }
            }
        })
    }
}

impl MonitorInner {
    async fn poll_once(&self) -> Result<usize, WalletError> {
        let _poll = self.poll_lock.lock().await;
        let addresses: Vec<Address> = self.cursors.lock().await.keys().cloned().collect();
        if addresses.is_empty() {
            return Ok(0);
        }

        let updates = match self.node.frontiers(&addresses).await {
            Ok(updates) => updates,
            Err(e) => {
                let error = WalletError::from(e);
                self.listeners.emit_error(&error);
                return Err(error);
            }
        };

        let mut emitted = 0;
        let mut reported = HashSet::new();
        for update in updates {
            reported.insert(update.address.clone());
            let Some(cursor) = self.cursors.lock().await.get(&update.address).copied() else {
                continue;
            };
            let last = match cursor {
                Cursor::Baseline => {
                    self.advance(&update.address, update.height).await;
                    continue;
                }
                Cursor::Seen(height) => height,
            };

            let mut reached = last;
            for height in last.range_to(update.height) {
                let hash = if height == update.height {
                    update.frontier
                } else {
                    match self.node.block_at(&update.address, height).await {
                        Ok(Some(block)) => block.hash,
                        Ok(None) => {
                            warn!(account = %update.address, %height, "node is missing a block");
                            break;
                        }
                        Err(e) => {
                            self.listeners.emit_error(&WalletError::from(e));
                            break;
                        }
                    }
                };
                debug!(account = %update.address, %height, %hash, "account changed");
                self.listeners.emit(&AccountChanged {
                    address: update.address.clone(),
                    height,
                    hash,
                });
                reached = height;
                emitted += 1;
            }
            if reached > last {
                self.advance(&update.address, reached).await;
            }
        }

        // Accounts the node does not know yet are unopened.
        let mut cursors = self.cursors.lock().await;
        for address in addresses {
            if !reported.contains(&address) {
                if let Some(cursor) = cursors.get_mut(&address) {
                    if *cursor == Cursor::Baseline {
                        *cursor = Cursor::Seen(Height::UNOPENED);
                    }
                }
            }
        }
        Ok(emitted)
    }

    /// Move the cursor of a still-watched address forward.
    async fn advance(&self, address: &Address, height: Height) {
        if let Some(cursor) = self.cursors.lock().await.get_mut(address) {
            *cursor = Cursor::Seen(height);
        }
    }
}
