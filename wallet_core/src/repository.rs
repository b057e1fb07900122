//! Persistent history for the transaction and entry feeds.
//!
//! A feed backed by a repository saves every item before listeners see it
//! and resumes each account at the height after the last saved item, so a
//! restarted wallet neither replays nor skips history.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use lattice_types::{AccountEntry, Address, Height, SignedBlock};
use tokio::sync::Mutex;

use crate::WalletError;

/// Something recorded at one height of one account chain.
pub trait Recorded {
    fn address(&self) -> &Address;
    fn height(&self) -> Height;
}

impl Recorded for SignedBlock {
    fn address(&self) -> &Address {
        &self.block.account
    }

    fn height(&self) -> Height {
        self.block.height
    }
}

impl Recorded for AccountEntry {
    fn address(&self) -> &Address {
        &self.address
    }

    fn height(&self) -> Height {
        self.height
    }
}

/// Storage for delivered feed items, keyed by account and height.
#[async_trait]
pub trait HistoryRepository<T>: Send + Sync {
    /// Store `item`. Saving the same height again replaces the old item.
    async fn save(&self, item: T) -> Result<(), WalletError>;

    /// The highest saved item of `address`.
    async fn last(&self, address: &Address) -> Result<Option<T>, WalletError>;

    /// Every saved item of `address` in height order.
    async fn history(&self, address: &Address) -> Result<Vec<T>, WalletError>;
}

pub type TransactionRepository = dyn HistoryRepository<SignedBlock>;
pub type AccountEntryRepository = dyn HistoryRepository<AccountEntry>;

/// Height a feed should deliver next for `address`.
pub async fn resume_height<T, R>(repository: &R, address: &Address) -> Result<Height, WalletError>
where
    T: Recorded,
    R: HistoryRepository<T> + ?Sized,
{
    Ok(repository
        .last(address)
        .await?
        .map_or(Height::OPEN, |item| item.height().next()))
}

/// Repository that lives as long as the process.
pub struct InMemoryRepository<T> {
    items: Mutex<HashMap<Address, BTreeMap<Height, T>>>,
}

impl<T> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> HistoryRepository<T> for InMemoryRepository<T>
where
    T: Recorded + Clone + Send + Sync + 'static,
{
    async fn save(&self, item: T) -> Result<(), WalletError> {
        self.items
            .lock()
            .await
            .entry(item.address().clone())
            .or_default()
            .insert(item.height(), item);
        Ok(())
    }

    async fn last(&self, address: &Address) -> Result<Option<T>, WalletError> {
        Ok(self
            .items
            .lock()
            .await
            .get(address)
            .and_then(|chain| chain.values().next_back().cloned()))
    }

    async fn history(&self, address: &Address) -> Result<Vec<T>, WalletError> {
        Ok(self
            .items
            .lock()
            .await
            .get(address)
            .map(|chain| chain.values().cloned().collect())
            .unwrap_or_default())
    }
}
