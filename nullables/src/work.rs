//! Nullable work provider: real (cheap) work with scripted failures.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use lattice_work::{WorkError, WorkGenerator, WorkProvider, WorkTarget};

/// Computes work inline and can be told to stall or fail.
///
/// Stalled requests never complete; the caller's timeout decides when to
/// give up, exactly as with an unresponsive remote worker.
#[derive(Default)]
pub struct NullWorkProvider {
    stall_next: AtomicUsize,
    fail_next: AtomicUsize,
    requests: AtomicUsize,
}

impl NullWorkProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` requests hang forever.
    pub fn stall_next(&self, count: usize) {
        self.stall_next.store(count, Ordering::SeqCst);
    }

    /// The next `count` requests fail immediately.
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Total number of requests received.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Decrement `counter` if positive, reporting whether it was.
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl WorkProvider for NullWorkProvider {
    async fn generate(&self, target: WorkTarget, threshold: u64) -> Result<u64, WorkError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.stall_next) {
            std::future::pending::<()>().await;
        }
        if take_one(&self.fail_next) {
            return Err(WorkError::Unavailable("scripted failure".into()));
        }
        WorkGenerator
            .generate(&target, threshold)
            .map(|nonce| nonce.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_work::validate_work;
    use std::time::Duration;

    #[tokio::test]
    async fn produces_valid_work() {
        let provider = NullWorkProvider::new();
        let target = WorkTarget([1; 32]);
        let nonce = provider.generate(target, 0xFF00_0000_0000_0000).await.unwrap();
        assert!(validate_work(&target, nonce, 0xFF00_0000_0000_0000));
    }

    #[tokio::test]
    async fn stalls_then_recovers() {
        let provider = NullWorkProvider::new();
        provider.stall_next(1);
        let stalled = tokio::time::timeout(
            Duration::from_millis(20),
            provider.generate(WorkTarget([2; 32]), 0),
        )
        .await;
        assert!(stalled.is_err());
        assert_eq!(provider.generate(WorkTarget([2; 32]), 0).await, Ok(0));
        assert_eq!(provider.requests(), 2);
    }

    #[tokio::test]
    async fn scripted_failure() {
        let provider = NullWorkProvider::new();
        provider.fail_next(1);
        assert!(provider.generate(WorkTarget([3; 32]), 0).await.is_err());
        assert!(provider.generate(WorkTarget([3; 32]), 0).await.is_ok());
    }
}
