//! Ed25519 signing of messages and block hashes.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use lattice_types::{BlockHash, PrivateKey, PublicKey, Signature, SignedBlock};

pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Verify a signature against a message and public key.
///
/// Invalid public key encodings verify as `false`.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(message, &dalek_sig).is_ok()
}

/// Blocks are signed over their 32-byte hash, not their full encoding.
pub fn sign_block(hash: &BlockHash, private_key: &PrivateKey) -> Signature {
    sign_message(hash.as_bytes(), private_key)
}

/// Check that the block's stored hash matches its contents and that the
/// signature over it belongs to `public_key`.
pub fn verify_block(block: &SignedBlock, public_key: &PublicKey) -> bool {
    block.block.hash() == block.hash
        && verify_signature(block.hash.as_bytes(), &block.signature, public_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keypair, keypair_from_secret};
    use lattice_types::{Address, Amount, Block, BlockKind, Height, Link, NetworkId, Timestamp};

    fn block() -> Block {
        Block {
            kind: BlockKind::Send,
            network: NetworkId::Dev,
            account: Address::new("lat_a"),
            height: Height::new(2),
            previous: Some(BlockHash::new([1; 32])),
            representative: Address::new("lat_rep"),
            balance: Amount::new(10),
            amount: Amount::new(5),
            link: Link::Destination(Address::new("lat_b")),
            timestamp: Timestamp::from_millis(1),
        }
    }

    #[test]
    fn sign_and_verify() {
        let kp = generate_keypair();
        let sig = sign_message(b"lattice", &kp.private);
        assert!(verify_signature(b"lattice", &sig, &kp.public));
        assert!(!verify_signature(b"other", &sig, &kp.public));
    }

    #[test]
    fn signature_deterministic() {
        let kp = keypair_from_secret(&[99u8; 32]);
        assert_eq!(
            sign_message(b"x", &kp.private),
            sign_message(b"x", &kp.private)
        );
    }

    #[test]
    fn invalid_public_key() {
        let kp = generate_keypair();
        let sig = sign_message(b"test", &kp.private);
        assert!(!verify_signature(b"test", &sig, &PublicKey([0xFF; 32])));
    }

    #[test]
    fn signed_block_verifies() {
        let kp = generate_keypair();
        let block = block();
        let sig = sign_block(&block.hash(), &kp.private);
        let signed = SignedBlock::new(block, sig, 0);
        assert!(verify_block(&signed, &kp.public));
        assert!(!verify_block(&signed, &generate_keypair().public));
    }

    #[test]
    fn tampered_block_fails() {
        let kp = generate_keypair();
        let block = block();
        let sig = sign_block(&block.hash(), &kp.private);
        let mut signed = SignedBlock::new(block, sig, 0);
        signed.block.balance = Amount::new(11);
        assert!(!verify_block(&signed, &kp.public));
    }
}
