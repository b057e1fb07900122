//! SLIP-10 hardened Ed25519 derivation of account keys from a seed.
//!
//! Account `i` lives at `m/44'/COIN_TYPE'/i'`. Ed25519 under SLIP-10 only
//! supports hardened children, so every path level sets the top bit and the
//! index itself must fit in 31 bits.

use hmac::{Hmac, Mac};
use lattice_types::{KeyIndex, KeyPair, PrivateKey, Seed};
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::keys::keypair_from_secret;
use crate::CryptoError;

type HmacSha512 = Hmac<Sha512>;

const MASTER_KEY: &[u8] = b"ed25519 seed";
const PURPOSE: u32 = 44;
/// Registered coin type of the lattice ledger.
pub const COIN_TYPE: u32 = 1_869_902_945;
const HARDENED: u32 = 0x8000_0000;

/// Secret key plus chain code, wiped when dropped.
struct ExtendedKey {
    key: Zeroizing<[u8; 32]>,
    chain_code: Zeroizing<[u8; 32]>,
}

impl ExtendedKey {
    fn from_hmac(hmac_key: &[u8], data: &[&[u8]]) -> Result<Self, CryptoError> {
        let mut mac = HmacSha512::new_from_slice(hmac_key)
            .map_err(|e| CryptoError::DerivationFailed(e.to_string()))?;
        for part in data {
            mac.update(part);
        }
        let mut output = Zeroizing::new([0u8; 64]);
        output.copy_from_slice(&mac.finalize().into_bytes());
        let mut key = Zeroizing::new([0u8; 32]);
        let mut chain_code = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&output[..32]);
        chain_code.copy_from_slice(&output[32..]);
        Ok(Self { key, chain_code })
    }

    fn master(seed: &Seed) -> Result<Self, CryptoError> {
        Self::from_hmac(MASTER_KEY, &[seed.as_bytes()])
    }

    fn hardened_child(&self, index: u32) -> Result<Self, CryptoError> {
        let index = (index | HARDENED).to_be_bytes();
        Self::from_hmac(
            self.chain_code.as_slice(),
            &[&[0u8], self.key.as_slice(), &index],
        )
    }
}

/// Derive the private key of account `index`.
///
/// Fails with [`CryptoError::InvalidIndex`] when `index` does not fit the
/// hardened range.
pub fn derive_private_key(seed: &Seed, index: KeyIndex) -> Result<PrivateKey, CryptoError> {
    if !index.is_valid() {
        return Err(CryptoError::InvalidIndex(index.value()));
    }
    let account = ExtendedKey::master(seed)?
        .hardened_child(PURPOSE)?
        .hardened_child(COIN_TYPE)?
        .hardened_child(index.value())?;
    Ok(PrivateKey(*account.key))
}

/// Derive the key pair of account `index`. Pure and deterministic.
pub fn derive_keypair(seed: &Seed, index: KeyIndex) -> Result<KeyPair, CryptoError> {
    let private = derive_private_key(seed, index)?;
    Ok(keypair_from_secret(&private.0))
}
