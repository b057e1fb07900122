//! Work pre-computation cache.
//!
//! After a block is confirmed its hash becomes the work target of the next
//! block on the account. Computing that nonce ahead of time makes the next
//! send or receive start with its work already available.

use std::collections::{HashMap, VecDeque};

use crate::WorkTarget;

/// Bounded cache of nonces keyed by work target.
///
/// Each entry remembers the threshold it was computed for; a lookup only
/// hits if that threshold is at least the one requested. Oldest entries are
/// evicted first.
pub struct WorkCache {
    cache: HashMap<WorkTarget, (u64, u64)>,
    order: VecDeque<WorkTarget>,
    max_entries: usize,
}

impl WorkCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: HashMap::with_capacity(max_entries),
            order: VecDeque::with_capacity(max_entries),
            max_entries: max_entries.max(1),
        }
    }

    pub fn insert(&mut self, target: WorkTarget, threshold: u64, nonce: u64) {
        if self.cache.insert(target, (threshold, nonce)).is_none() {
            self.order.push_back(target);
        }
        while self.cache.len() > self.max_entries {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.cache.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Cached nonce for `target` valid for at least `threshold`.
    pub fn get(&self, target: &WorkTarget, threshold: u64) -> Option<u64> {
        self.cache
            .get(target)
            .filter(|(cached_threshold, _)| *cached_threshold >= threshold)
            .map(|(_, nonce)| *nonce)
    }

    pub fn remove(&mut self, target: &WorkTarget) {
        if self.cache.remove(target).is_some() {
            self.order.retain(|t| t != target);
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
