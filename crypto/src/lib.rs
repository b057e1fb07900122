//! Cryptographic primitives for the lattice wallet engine.
//!
//! - **Ed25519** for signing and signature verification
//! - **Blake2b** for hashing (block hashes, proof-of-work)
//! - **SLIP-10** hardened derivation of account keys from a BIP39 seed
//! - Address derivation with `lat_` prefix and base32 encoding

pub mod address;
pub mod derivation;
pub mod error;
pub mod hash;
pub mod keys;
pub mod mnemonic;
pub mod sign;

pub use address::{decode_address, derive_address, public_key_of, validate_address};
pub use derivation::{derive_keypair, derive_private_key, COIN_TYPE};
pub use error::CryptoError;
pub use hash::{blake2b_256, blake2b_256_multi, hash_block};
pub use keys::{generate_keypair, keypair_from_private, keypair_from_secret, public_from_private};
pub use mnemonic::{generate_mnemonic, mnemonic_to_seed, validate_mnemonic, MnemonicError};
pub use sign::{sign_block, sign_message, verify_block, verify_signature};
