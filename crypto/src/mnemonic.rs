//! BIP39 mnemonic generation and conversion to a wallet seed.
//!
//! The seed is the 64-byte PBKDF2-HMAC-SHA512 output of the phrase (salt
//! `"mnemonic" + passphrase`, 2048 rounds). Account keys are derived from it
//! in [`crate::derivation`].

use bip39::Mnemonic;
use lattice_types::Seed;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MnemonicError {
    #[error("invalid mnemonic phrase: {0}")]
    InvalidMnemonic(String),

    #[error("mnemonic generation failed: {0}")]
    GenerationFailed(String),
}

/// Generate a new 24-word BIP39 mnemonic from 256-bit entropy.
pub fn generate_mnemonic() -> Result<String, MnemonicError> {
    let mut entropy = zeroize::Zeroizing::new([0u8; 32]);
    rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, entropy.as_mut_slice());
    let mnemonic = Mnemonic::from_entropy(entropy.as_slice())
        .map_err(|e| MnemonicError::GenerationFailed(e.to_string()))?;
    Ok(mnemonic.to_string())
}

/// Convert a phrase (and optional passphrase) into the wallet seed.
pub fn mnemonic_to_seed(phrase: &str, passphrase: &str) -> Result<Seed, MnemonicError> {
    let mnemonic = Mnemonic::parse_normalized(phrase)
        .map_err(|e| MnemonicError::InvalidMnemonic(e.to_string()))?;
    Ok(Seed::new(mnemonic.to_seed_normalized(passphrase)))
}

pub fn validate_mnemonic(phrase: &str) -> bool {
    Mnemonic::parse_normalized(phrase).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABANDON_ART: &str = "abandon abandon abandon abandon abandon abandon abandon abandon \
        abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon \
        abandon abandon abandon abandon art";

    #[test]
    fn generate_produces_valid_24_words() {
        let mnemonic = generate_mnemonic().unwrap();
        assert_eq!(mnemonic.split_whitespace().count(), 24);
        assert!(validate_mnemonic(&mnemonic));
    }

    #[test]
    fn seed_is_deterministic() {
        let a = mnemonic_to_seed(ABANDON_ART, "").unwrap();
        let b = mnemonic_to_seed(ABANDON_ART, "").unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn passphrase_changes_seed() {
        let a = mnemonic_to_seed(ABANDON_ART, "").unwrap();
        let b = mnemonic_to_seed(ABANDON_ART, "TREZOR").unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn invalid_mnemonic_rejected() {
        assert!(!validate_mnemonic("not a valid mnemonic phrase"));
        assert!(mnemonic_to_seed("invalid words here", "").is_err());
    }
}
