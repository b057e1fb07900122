//! Incoming sends the wallet knows about, and whether it received them.

use std::collections::HashMap;

use lattice_types::{Address, Amount, BlockHash, Receivable};
use tokio::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingReceivable {
    pub receivable: Receivable,
    pub received: bool,
}

/// Book of receivables keyed by source block hash.
///
/// Entries flip to received when the pipeline confirms a matching receive
/// block, so every consumer (manual receive, auto-receiver) skips them.
#[derive(Debug, Default)]
pub struct ReceivableBook {
    entries: Mutex<HashMap<BlockHash, PendingReceivable>>,
}

impl ReceivableBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record receivables reported by the node. Known entries keep their
    /// received flag; returns how many were new.
    pub async fn record(&self, receivables: impl IntoIterator<Item = Receivable>) -> usize {
        let mut entries = self.entries.lock().await;
        let mut added = 0;
        for receivable in receivables {
            entries.entry(receivable.source_hash).or_insert_with(|| {
                added += 1;
                PendingReceivable {
                    receivable,
                    received: false,
                }
            });
        }
        added
    }

    pub async fn mark_received(&self, receivable: &Receivable) {
        self.entries
            .lock()
            .await
            .entry(receivable.source_hash)
            .or_insert_with(|| PendingReceivable {
                receivable: receivable.clone(),
                received: true,
            })
            .received = true;
    }

    pub async fn is_received(&self, source: &BlockHash) -> bool {
        self.entries
            .lock()
            .await
            .get(source)
            .is_some_and(|entry| entry.received)
    }

    pub async fn get(&self, source: &BlockHash) -> Option<PendingReceivable> {
        self.entries.lock().await.get(source).cloned()
    }

    /// Unreceived entries for `address` of at least `min_amount`, oldest first.
    pub async fn unreceived(&self, address: &Address, min_amount: Amount) -> Vec<Receivable> {
        let entries = self.entries.lock().await;
        let mut found: Vec<Receivable> = entries
            .values()
            .filter(|entry| {
                !entry.received
                    && &entry.receivable.receiver == address
                    && entry.receivable.amount >= min_amount
            })
            .map(|entry| entry.receivable.clone())
            .collect();
        found.sort_by_key(|r| (r.timestamp, r.source_hash));
        found
    }

    /// Drop every entry addressed to `address`.
    pub async fn forget(&self, address: &Address) {
        self.entries
            .lock()
            .await
            .retain(|_, entry| &entry.receivable.receiver != address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_types::Timestamp;

    fn receivable(tag: u8, to: &str, amount: u64, at: u64) -> Receivable {
        Receivable {
            source_hash: BlockHash::new([tag; 32]),
            source_account: Address::new("lat_sender"),
            receiver: Address::new(format!("lat_{to}")),
            amount: Amount::new(amount),
            timestamp: Timestamp::from_millis(at),
        }
    }

    #[tokio::test]
    async fn unreceived_filters_and_orders() {
        let book = ReceivableBook::new();
        let added = book
            .record(vec![
                receivable(1, "bob", 50, 30),
                receivable(2, "bob", 5, 10),
                receivable(3, "bob", 70, 20),
                receivable(4, "carol", 90, 1),
            ])
            .await;
        assert_eq!(added, 4);

        let found = book
            .unreceived(&Address::new("lat_bob"), Amount::new(10))
            .await;
        let tags: Vec<u8> = found.iter().map(|r| r.source_hash.as_bytes()[0]).collect();
        assert_eq!(tags, vec![3, 1]);
    }

    #[tokio::test]
    async fn received_entries_are_skipped_and_stay_received() {
        let book = ReceivableBook::new();
        let entry = receivable(1, "bob", 50, 30);
        book.record(vec![entry.clone()]).await;
        book.mark_received(&entry).await;
        assert!(book.is_received(&entry.source_hash).await);

        assert_eq!(book.record(vec![entry.clone()]).await, 0);
        assert!(book.is_received(&entry.source_hash).await);
        assert!(book
            .unreceived(&Address::new("lat_bob"), Amount::ZERO)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn marking_unknown_entry_records_it_received() {
        let book = ReceivableBook::new();
        let entry = receivable(9, "bob", 5, 1);
        book.mark_received(&entry).await;
        assert_eq!(book.record(vec![entry.clone()]).await, 0);
        assert!(book.is_received(&entry.source_hash).await);
    }

    #[tokio::test]
    async fn forget_drops_address_entries() {
        let book = ReceivableBook::new();
        book.record(vec![receivable(1, "bob", 1, 1), receivable(2, "carol", 1, 1)])
            .await;
        book.forget(&Address::new("lat_bob")).await;
        assert!(book.get(&BlockHash::new([1; 32])).await.is_none());
        assert!(book.get(&BlockHash::new([2; 32])).await.is_some());
    }
}
