use proptest::prelude::*;

use lattice_types::BlockKind;
use lattice_work::{validate_work, work_value, WorkGenerator, WorkTarget, WorkThresholds};

proptest! {
    /// Generated PoW always passes its own validation.
    #[test]
    fn generated_pow_always_valid(
        byte in 0u8..=255,
        threshold in 0u64..0xF000_0000_0000_0000,
    ) {
        let target = WorkTarget([byte; 32]);
        let nonce = WorkGenerator.generate(&target, threshold).unwrap();
        prop_assert!(validate_work(&target, nonce.0, threshold));
    }

    /// Zero threshold always passes regardless of nonce.
    #[test]
    fn zero_threshold_always_passes(
        bytes in prop::array::uniform32(0u8..),
        nonce in any::<u64>(),
    ) {
        prop_assert!(validate_work(&WorkTarget(bytes), nonce, 0));
    }

    /// Lower thresholds are easier to meet: if valid at T, then valid at T-1.
    #[test]
    fn lower_threshold_is_easier(
        bytes in prop::array::uniform32(0u8..),
        nonce in any::<u64>(),
        threshold in 1u64..u64::MAX,
    ) {
        let target = WorkTarget(bytes);
        if validate_work(&target, nonce, threshold) {
            prop_assert!(validate_work(&target, nonce, threshold - 1));
        }
    }

    /// Work valid for a receive block is valid for a send on the same target.
    #[test]
    fn receive_work_satisfies_send(bytes in prop::array::uniform32(0u8..), nonce in any::<u64>()) {
        let thresholds = WorkThresholds::with_base(0xFF00_0000_0000_0000);
        let target = WorkTarget(bytes);
        let value = work_value(&target, nonce);
        if value >= thresholds.threshold_for(BlockKind::Receive) {
            prop_assert!(value >= thresholds.threshold_for(BlockKind::Send));
        }
    }
}
