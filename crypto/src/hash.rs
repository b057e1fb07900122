//! Blake2b hashing for blocks and proof-of-work.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use lattice_types::{Block, BlockHash};

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash the canonical encoding of an unsigned block.
pub fn hash_block(block: &Block) -> BlockHash {
    BlockHash::new(blake2b_256(&block.canonical_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake2b_deterministic() {
        let h1 = blake2b_256(b"hello lattice");
        let h2 = blake2b_256(b"hello lattice");
        assert_eq!(h1, h2);
    }

    #[test]
    fn blake2b_different_inputs() {
        let h1 = blake2b_256(b"hello");
        let h2 = blake2b_256(b"world");
        assert_ne!(h1, h2);
    }

    #[test]
    fn blake2b_empty() {
        let h = blake2b_256(b"");
        assert_ne!(h, [0u8; 32]);
    }

    #[test]
    fn blake2b_multi_equivalent() {
        let single = blake2b_256(b"helloworld");
        let multi = blake2b_256_multi(&[b"hello", b"world"]);
        assert_eq!(single, multi);
    }

    #[test]
    fn hash_block_matches_block_hash() {
        use lattice_types::{Address, Amount, BlockKind, Height, Link, NetworkId, Timestamp};
        let block = Block {
            kind: BlockKind::Change,
            network: NetworkId::Dev,
            account: Address::new("lat_a"),
            height: Height::new(3),
            previous: Some(BlockHash::new([2; 32])),
            representative: Address::new("lat_rep"),
            balance: Amount::new(5),
            amount: Amount::ZERO,
            link: Link::None,
            timestamp: Timestamp::from_millis(77),
        };
        assert_eq!(hash_block(&block), block.hash());
        assert!(!hash_block(&block).is_zero());
    }
}
