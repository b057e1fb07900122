//! Nullable clock: deterministic time for testing.

use std::sync::atomic::{AtomicU64, Ordering};

use lattice_types::Timestamp;

/// A deterministic millisecond clock.
///
/// Time only advances when told to, or by `step` on every read when built
/// with [`NullClock::ticking`].
pub struct NullClock {
    current: AtomicU64,
    step: u64,
}

impl NullClock {
    pub fn new(initial_millis: u64) -> Self {
        Self::ticking(initial_millis, 0)
    }

    /// A clock that moves forward `step` milliseconds after every read.
    pub fn ticking(initial_millis: u64, step: u64) -> Self {
        Self {
            current: AtomicU64::new(initial_millis),
            step,
        }
    }

    pub fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.current.fetch_add(self.step, Ordering::SeqCst))
    }

    pub fn advance(&self, millis: u64) {
        self.current.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.current.store(millis, Ordering::SeqCst);
    }
}

impl Default for NullClock {
    fn default() -> Self {
        Self::ticking(1_700_000_000_000, 1)
    }
}
