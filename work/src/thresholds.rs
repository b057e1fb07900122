//! Block-kind-aware PoW thresholds per network.
//!
//! - Open/Receive blocks need a HIGHER threshold (crediting funds is free for
//!   the receiver, so it carries the anti-spam cost)
//! - Send/Change blocks need the BASE threshold

use lattice_types::{BlockKind, NetworkId};

const LIVE_BASE: u64 = 0xFFFF_FE00_0000_0000;
const TEST_BASE: u64 = 0xFFFF_F000_0000_0000;
const DEV_BASE: u64 = 0xFF00_0000_0000_0000;
const RECEIVE_MULTIPLIER: f64 = 8.0;

/// Per-kind PoW thresholds.
///
/// Higher threshold values = harder work required. `multiply` scales
/// difficulty by shrinking the inverse gap (`u64::MAX - threshold`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorkThresholds {
    pub base: u64,
    pub receive_multiplier: f64,
}

impl WorkThresholds {
    pub fn for_network(network: NetworkId) -> Self {
        let base = match network {
            NetworkId::Live => LIVE_BASE,
            NetworkId::Test => TEST_BASE,
            NetworkId::Dev => DEV_BASE,
        };
        Self::with_base(base)
    }

    /// Construct with a custom base (0 disables PoW).
    pub fn with_base(base: u64) -> Self {
        Self {
            base,
            receive_multiplier: RECEIVE_MULTIPLIER,
        }
    }

    pub fn threshold_for(&self, kind: BlockKind) -> u64 {
        if kind.is_receive() {
            self.multiply(self.base, self.receive_multiplier)
        } else {
            self.base
        }
    }

    /// When `base` is 0 (PoW disabled), all derived thresholds are also 0.
    fn multiply(&self, base: u64, multiplier: f64) -> u64 {
        if base == 0 {
            return 0;
        }
        let difficulty_inv = u64::MAX - base;
        let scaled_inv = (difficulty_inv as f64 / multiplier) as u64;
        u64::MAX - scaled_inv
    }
}
