//! Deterministic account keys from the wallet seed.

use std::fmt;

use lattice_crypto::{derive_address, derive_keypair, mnemonic_to_seed};
use lattice_types::{Address, KeyIndex, KeyPair, PublicKey, Seed};

use crate::WalletError;

/// One account derived from the seed.
pub struct DerivedAccount {
    pub index: KeyIndex,
    pub keypair: KeyPair,
    pub address: Address,
}

impl fmt::Debug for DerivedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedAccount")
            .field("index", &self.index)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Derive the keys and address of account `index`. Pure and deterministic.
pub fn derive(seed: &Seed, index: KeyIndex) -> Result<DerivedAccount, WalletError> {
    let keypair = derive_keypair(seed, index)?;
    let address = derive_address(&keypair.public);
    Ok(DerivedAccount {
        index,
        keypair,
        address,
    })
}

/// Sole owner of the wallet seed.
///
/// Private keys are derived on demand and dropped (zeroized) as soon as the
/// caller is done with them; nothing here caches secret material.
pub struct KeyDerivation {
    seed: Seed,
}

impl KeyDerivation {
    pub fn new(seed: Seed) -> Self {
        Self { seed }
    }

    pub fn from_mnemonic(phrase: &str, passphrase: &str) -> Result<Self, WalletError> {
        let seed = mnemonic_to_seed(phrase, passphrase)
            .map_err(|e| WalletError::InvalidSeed(e.to_string()))?;
        Ok(Self::new(seed))
    }

    pub fn derive(&self, index: KeyIndex) -> Result<DerivedAccount, WalletError> {
        derive(&self.seed, index)
    }

    pub fn public_key(&self, index: KeyIndex) -> Result<PublicKey, WalletError> {
        Ok(self.derive(index)?.keypair.public)
    }

    pub fn address(&self, index: KeyIndex) -> Result<Address, WalletError> {
        Ok(self.derive(index)?.address)
    }

    /// Run `f` with the private key pair of `index`, then wipe it.
    pub fn with_keypair<R>(
        &self,
        index: KeyIndex,
        f: impl FnOnce(&KeyPair) -> R,
    ) -> Result<R, WalletError> {
        let account = self.derive(index)?;
        Ok(f(&account.keypair))
    }
}

impl fmt::Debug for KeyDerivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyDerivation(..)")
    }
}
