//! PoW validation.

use lattice_crypto::blake2b_256;
use lattice_types::{NetworkId, SignedBlock};

use crate::{work_target, WorkError, WorkTarget, WorkThresholds};

/// Little-endian u64 of the first 8 bytes of Blake2b(target || nonce_le).
pub fn work_value(target: &WorkTarget, nonce: u64) -> u64 {
    let mut input = [0u8; 40];
    input[0..32].copy_from_slice(target.as_bytes());
    input[32..40].copy_from_slice(&nonce.to_le_bytes());
    let hash = blake2b_256(&input);
    let mut value = [0u8; 8];
    value.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(value)
}

/// Whether `nonce` clears `threshold` for `target`.
pub fn validate_work(target: &WorkTarget, nonce: u64, threshold: u64) -> bool {
    work_value(target, nonce) >= threshold
}

/// Check a signed block's work against the thresholds of `network`.
pub fn validate_block_work(block: &SignedBlock, network: NetworkId) -> Result<(), WorkError> {
    let target = work_target(&block.block)?;
    let minimum = WorkThresholds::for_network(network).threshold_for(block.block.kind);
    let actual = work_value(&target, block.work);
    if actual >= minimum {
        Ok(())
    } else {
        Err(WorkError::InsufficientDifficulty { actual, minimum })
    }
}
