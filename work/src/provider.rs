//! Work providers: the capability the wallet asks for proof-of-work.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{WorkCache, WorkError, WorkGenerator, WorkTarget};

/// Produces a nonce whose work value over `target` clears `threshold`.
///
/// Implementations may take arbitrarily long; callers bound the wait with
/// their own timeout and drop the future to abandon a request.
#[async_trait]
pub trait WorkProvider: Send + Sync {
    async fn generate(&self, target: WorkTarget, threshold: u64) -> Result<u64, WorkError>;

    /// Called after a block built on `used` is confirmed and `next` became
    /// the account's new work target.
    async fn on_confirmed(&self, _used: WorkTarget, _next: WorkTarget, _next_threshold: u64) {}
}

#[async_trait]
impl<P: WorkProvider + ?Sized> WorkProvider for Arc<P> {
    async fn generate(&self, target: WorkTarget, threshold: u64) -> Result<u64, WorkError> {
        (**self).generate(target, threshold).await
    }

    async fn on_confirmed(&self, used: WorkTarget, next: WorkTarget, next_threshold: u64) {
        (**self).on_confirmed(used, next, next_threshold).await
    }
}

/// Computes work locally on the rayon pool.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuWorkProvider;

/// Stops the generator when the awaiting future is dropped.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl WorkProvider for CpuWorkProvider {
    async fn generate(&self, target: WorkTarget, threshold: u64) -> Result<u64, WorkError> {
        let cancel = Arc::new(AtomicBool::new(false));
        let _guard = CancelOnDrop(cancel.clone());
        let nonce = tokio::task::spawn_blocking(move || {
            WorkGenerator.generate_cancellable(&target, threshold, &cancel)
        })
        .await
        .map_err(|e| WorkError::Unavailable(e.to_string()))??;
        Ok(nonce.0)
    }
}

type Slot = Arc<Mutex<()>>;
type InFlight = Arc<std::sync::Mutex<HashMap<WorkTarget, Slot>>>;

/// Releases an in-flight slot however the request ends, including when the
/// caller drops the future. A slot that was already replaced is left alone.
struct SlotRelease<'a> {
    in_flight: &'a InFlight,
    target: WorkTarget,
    slot: Slot,
}

impl Drop for SlotRelease<'_> {
    fn drop(&mut self) {
        let mut map = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if map
            .get(&self.target)
            .is_some_and(|current| Arc::ptr_eq(current, &self.slot))
        {
            map.remove(&self.target);
        }
    }
}

/// Wraps another provider with a nonce cache.
///
/// Concurrent requests for the same target share one upstream request, and
/// once a block is confirmed the work for the account's next target is
/// computed in the background.
pub struct CachedWorkProvider {
    inner: Arc<dyn WorkProvider>,
    cache: Arc<Mutex<WorkCache>>,
    in_flight: InFlight,
}

impl CachedWorkProvider {
    pub fn new(inner: Arc<dyn WorkProvider>, capacity: usize) -> Self {
        Self {
            inner,
            cache: Arc::new(Mutex::new(WorkCache::new(capacity))),
            in_flight: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

    pub async fn cached(&self, target: &WorkTarget, threshold: u64) -> Option<u64> {
        self.cache.lock().await.get(target, threshold)
    }

    /// Start computing work for `target` without waiting for it.
    pub fn precompute(&self, target: WorkTarget, threshold: u64) -> tokio::task::JoinHandle<()> {
        let inner = self.inner.clone();
        let cache = self.cache.clone();
        let in_flight = self.in_flight.clone();
        tokio::spawn(async move {
            match fetch(&*inner, &cache, &in_flight, target, threshold).await {
                Ok(_) => debug!(work_target = ?target, "precomputed work"),
                Err(e) => warn!(work_target = ?target, error = %e, "work precompute failed"),
            }
        })
    }
}

async fn fetch(
    inner: &dyn WorkProvider,
    cache: &Mutex<WorkCache>,
    in_flight: &InFlight,
    target: WorkTarget,
    threshold: u64,
) -> Result<u64, WorkError> {
    if let Some(nonce) = cache.lock().await.get(&target, threshold) {
        return Ok(nonce);
    }

    let slot = in_flight
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(target)
        .or_default()
        .clone();
    let release = SlotRelease {
        in_flight,
        target,
        slot,
    };
    let _slot_guard = release.slot.lock().await;

    // A request that held the slot before us may have filled the cache.
    if let Some(nonce) = cache.lock().await.get(&target, threshold) {
        return Ok(nonce);
    }

    let result = inner.generate(target, threshold).await;
    if let Ok(nonce) = result {
        cache.lock().await.insert(target, threshold, nonce);
    }
    result
}

#[async_trait]
impl WorkProvider for CachedWorkProvider {
    async fn generate(&self, target: WorkTarget, threshold: u64) -> Result<u64, WorkError> {
        fetch(&*self.inner, &self.cache, &self.in_flight, target, threshold).await
    }

    async fn on_confirmed(&self, used: WorkTarget, next: WorkTarget, next_threshold: u64) {
        self.cache.lock().await.remove(&used);
        self.precompute(next, next_threshold);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate_work;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Counts upstream requests and answers after a short delay.
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WorkProvider for CountingProvider {
        async fn generate(&self, target: WorkTarget, _threshold: u64) -> Result<u64, WorkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(u64::from(target.0[0]))
        }
    }

    #[tokio::test]
    async fn cpu_provider_produces_valid_work() {
        let target = WorkTarget([3; 32]);
        let threshold = 0xF000_0000_0000_0000;
        let nonce = CpuWorkProvider.generate(target, threshold).await.unwrap();
        assert!(validate_work(&target, nonce, threshold));
    }

    #[tokio::test]
    async fn cpu_provider_stops_on_timeout() {
        let result = tokio::time::timeout(
            Duration::from_millis(20),
            CpuWorkProvider.generate(WorkTarget([4; 32]), u64::MAX),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_upstream_call() {
        let upstream = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let cached = Arc::new(CachedWorkProvider::new(upstream.clone(), 8));
        let target = WorkTarget([9; 32]);

        let a = tokio::spawn({
            let cached = cached.clone();
            async move { cached.generate(target, 10).await }
        });
        let b = tokio::spawn({
            let cached = cached.clone();
            async move { cached.generate(target, 10).await }
        });
        assert_eq!(a.await.unwrap().unwrap(), 9);
        assert_eq!(b.await.unwrap().unwrap(), 9);
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
    }

    /// Never answers the first request, answers every later one at once.
    struct StallsOnce {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WorkProvider for StallsOnce {
        async fn generate(&self, target: WorkTarget, _threshold: u64) -> Result<u64, WorkError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                std::future::pending::<()>().await;
            }
            Ok(u64::from(target.0[0]))
        }
    }

    #[tokio::test]
    async fn abandoned_request_releases_its_slot() {
        let upstream = Arc::new(StallsOnce {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedWorkProvider::new(upstream.clone(), 8);
        let target = WorkTarget([5; 32]);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), cached.generate(target, 10)).await;
        assert!(abandoned.is_err());
        assert!(cached.in_flight.lock().unwrap().is_empty());

        assert_eq!(cached.generate(target, 10).await.unwrap(), 5);
        assert!(cached.in_flight.lock().unwrap().is_empty());
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn confirmation_precomputes_next_target() {
        let upstream = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedWorkProvider::new(upstream.clone(), 8);
        let used = WorkTarget([1; 32]);
        let next = WorkTarget([2; 32]);
        cached.generate(used, 10).await.unwrap();

        cached.on_confirmed(used, next, 10).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(cached.cached(&used, 10).await, None);
        assert_eq!(cached.cached(&next, 10).await, Some(2));
        assert_eq!(cached.generate(next, 10).await.unwrap(), 2);
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
    }
}
