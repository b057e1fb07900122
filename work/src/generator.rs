//! PoW generation (multi-threaded CPU).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rayon::prelude::*;

use crate::{work_value, WorkError, WorkNonce, WorkTarget};

/// Generates proof-of-work using all available CPU cores.
pub struct WorkGenerator;

/// Nonces each thread tries before checking the stop flags.
const BATCH_SIZE: u64 = 4096;

impl WorkGenerator {
    pub fn generate(&self, target: &WorkTarget, threshold: u64) -> Result<WorkNonce, WorkError> {
        self.generate_cancellable(target, threshold, &AtomicBool::new(false))
    }

    /// Generate a nonce clearing `threshold`, giving up once `cancel` is set.
    ///
    /// Splits the nonce space across the rayon pool. The first thread to find
    /// a valid nonce signals the others to stop.
    pub fn generate_cancellable(
        &self,
        target: &WorkTarget,
        threshold: u64,
        cancel: &AtomicBool,
    ) -> Result<WorkNonce, WorkError> {
        if threshold == 0 {
            return Ok(WorkNonce(0));
        }

        let found = AtomicU64::new(u64::MAX);
        let num_threads = rayon::current_num_threads().max(1);

        (0..num_threads).into_par_iter().for_each(|thread_id| {
            let mut nonce = thread_id as u64;
            let stride = num_threads as u64;

            loop {
                if found.load(Ordering::Relaxed) != u64::MAX || cancel.load(Ordering::Relaxed) {
                    return;
                }
                let end = nonce.saturating_add(BATCH_SIZE * stride);
                while nonce < end {
                    if work_value(target, nonce) >= threshold {
                        found.store(nonce, Ordering::Relaxed);
                        return;
                    }
                    nonce = nonce.wrapping_add(stride);
                }
            }
        });

        match found.load(Ordering::Relaxed) {
            u64::MAX => Err(WorkError::Cancelled),
            nonce => Ok(WorkNonce(nonce)),
        }
    }
}
