//! Signing capability used by the submission pipeline.

use async_trait::async_trait;
use lattice_crypto::{derive_address, public_from_private, sign_block};
use lattice_types::{Address, BlockHash, KeyIndex, PrivateKey, PublicKey, Seed, Signature};

use crate::keys::KeyDerivation;
use crate::WalletError;

/// Produces signatures for the accounts it holds keys for.
///
/// Implementations may be remote (hardware wallets, signing services), so
/// signing is async even though local signing never suspends.
#[async_trait]
pub trait Signer: Send + Sync {
    fn public_key(&self, index: KeyIndex) -> Result<PublicKey, WalletError>;

    async fn sign(&self, index: KeyIndex, hash: &BlockHash) -> Result<Signature, WalletError>;

    fn address(&self, index: KeyIndex) -> Result<Address, WalletError> {
        Ok(derive_address(&self.public_key(index)?))
    }
}

/// Signs for every index derivable from an owned seed.
pub struct SeedSigner {
    keys: KeyDerivation,
}

impl SeedSigner {
    pub fn new(seed: Seed) -> Self {
        Self {
            keys: KeyDerivation::new(seed),
        }
    }

    pub fn from_mnemonic(phrase: &str, passphrase: &str) -> Result<Self, WalletError> {
        Ok(Self {
            keys: KeyDerivation::from_mnemonic(phrase, passphrase)?,
        })
    }
}

#[async_trait]
impl Signer for SeedSigner {
    fn public_key(&self, index: KeyIndex) -> Result<PublicKey, WalletError> {
        self.keys.public_key(index)
    }

    async fn sign(&self, index: KeyIndex, hash: &BlockHash) -> Result<Signature, WalletError> {
        self.keys
            .with_keypair(index, |keypair| sign_block(hash, &keypair.private))
    }
}

/// Signs with one standalone private key, exposed as index 0.
pub struct KeySigner {
    private: PrivateKey,
    public: PublicKey,
}

impl KeySigner {
    pub fn new(private: PrivateKey) -> Self {
        let public = public_from_private(&private);
        Self { private, public }
    }

    fn check(index: KeyIndex) -> Result<(), WalletError> {
        if index.value() == 0 {
            Ok(())
        } else {
            Err(WalletError::InvalidIndex(format!(
                "single-key signer only holds index 0, got {index}"
            )))
        }
    }
}

#[async_trait]
impl Signer for KeySigner {
    fn public_key(&self, index: KeyIndex) -> Result<PublicKey, WalletError> {
        Self::check(index)?;
        Ok(self.public.clone())
    }

    async fn sign(&self, index: KeyIndex, hash: &BlockHash) -> Result<Signature, WalletError> {
        Self::check(index)?;
        Ok(sign_block(hash, &self.private))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_crypto::verify_signature;

    #[tokio::test]
    async fn seed_signer_signs_for_derived_key() {
        let signer = SeedSigner::new(Seed::new([5; 64]));
        let hash = BlockHash::new([1; 32]);
        let index = KeyIndex::new(2);
        let signature = signer.sign(index, &hash).await.unwrap();
        let public = signer.public_key(index).unwrap();
        assert!(verify_signature(hash.as_bytes(), &signature, &public));
    }

    #[tokio::test]
    async fn key_signer_only_serves_index_zero() {
        let signer = KeySigner::new(PrivateKey([4; 32]));
        let hash = BlockHash::new([2; 32]);
        let signature = signer.sign(KeyIndex::new(0), &hash).await.unwrap();
        assert!(verify_signature(
            hash.as_bytes(),
            &signature,
            &signer.public_key(KeyIndex::new(0)).unwrap()
        ));
        assert!(matches!(
            signer.sign(KeyIndex::new(1), &hash).await,
            Err(WalletError::InvalidIndex(_))
        ));
    }

    #[test]
    fn address_follows_public_key() {
        let signer = SeedSigner::new(Seed::new([5; 64]));
        let index = KeyIndex::new(0);
        assert_eq!(
            signer.address(index).unwrap(),
            derive_address(&signer.public_key(index).unwrap())
        );
    }
}
