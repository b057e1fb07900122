use proptest::prelude::*;

use lattice_types::{
    Address, Amount, Block, BlockHash, BlockKind, Height, KeyIndex, Link, NetworkId, Timestamp,
};

fn block(balance: u64, amount: u64, timestamp: u64) -> Block {
    Block {
        kind: BlockKind::Send,
        network: NetworkId::Dev,
        account: Address::new("lat_source"),
        height: Height::new(2),
        previous: Some(BlockHash::new([1; 32])),
        representative: Address::new("lat_rep"),
        balance: Amount::new(balance),
        amount: Amount::new(amount),
        link: Link::Destination(Address::new("lat_dest")),
        timestamp: Timestamp::from_millis(timestamp),
    }
}

proptest! {
    /// BlockHash hex roundtrip: Display -> from_hex yields the same hash.
    #[test]
    fn block_hash_hex_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let hash = BlockHash::new(bytes);
        let parsed = BlockHash::from_hex(&hash.to_string()).unwrap();
        prop_assert_eq!(parsed, hash);
    }

    /// BlockHash::is_zero is true only for all-zero bytes.
    #[test]
    fn block_hash_is_zero_correct(bytes in prop::array::uniform32(0u8..)) {
        let hash = BlockHash::new(bytes);
        prop_assert_eq!(hash.is_zero(), bytes == [0u8; 32]);
    }

    /// range_to yields exactly the heights strictly after `from`, in order.
    #[test]
    fn height_range_is_contiguous(from in 0u64..1_000, span in 0u64..64) {
        let to = Height::new(from + span);
        let heights: Vec<u64> = Height::new(from).range_to(to).map(|h| h.value()).collect();
        prop_assert_eq!(heights.len() as u64, span);
        for (offset, h) in heights.iter().enumerate() {
            prop_assert_eq!(*h, from + 1 + offset as u64);
        }
    }

    /// Subtracting then adding back restores the original amount.
    #[test]
    fn amount_sub_add_inverse(a in 0u64..=Amount::MAX.raw(), b in 0u64..=Amount::MAX.raw()) {
        let (big, small) = if a >= b { (a, b) } else { (b, a) };
        let diff = Amount::new(big).try_sub(Amount::new(small)).unwrap();
        prop_assert_eq!(diff.try_add(Amount::new(small)).unwrap(), Amount::new(big));
    }

    /// Subtracting more than is available always fails.
    #[test]
    fn amount_underflow_rejected(balance in 0u64..1_000_000, extra in 1u64..1_000) {
        prop_assert!(Amount::new(balance).try_sub(Amount::new(balance + extra)).is_err());
    }

    /// Only indexes below 2^31 are usable with hardened derivation.
    #[test]
    fn key_index_validity(raw in any::<u32>()) {
        prop_assert_eq!(KeyIndex::new(raw).is_valid(), raw < 0x8000_0000);
    }

    /// Any change to the balance or timestamp changes the block hash.
    #[test]
    fn block_hash_covers_contents(balance in 0u64..1_000_000, ts in 0u64..1_000_000) {
        let a = block(balance, 10, ts);
        prop_assert_ne!(a.hash(), block(balance + 1, 10, ts).hash());
        prop_assert_ne!(a.hash(), block(balance, 10, ts + 1).hash());
        prop_assert_eq!(a.hash(), block(balance, 10, ts).hash());
    }

    /// Block bincode serialization roundtrip preserves the hash.
    #[test]
    fn block_bincode_roundtrip(balance in 0u64..1_000_000, amount in 1u64..1_000) {
        let original = block(balance, amount, 42);
        let decoded: Block = bincode::deserialize(&bincode::serialize(&original).unwrap()).unwrap();
        prop_assert_eq!(decoded.hash(), original.hash());
    }
}
