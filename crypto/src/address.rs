//! Account address encoding.
//!
//! Address format: `lat_` + base32(public_key, 52 chars) + base32(checksum, 8 chars)
//!
//! Checksum: first 5 bytes of Blake2b-256(public_key).
//! Total address length: 4 (prefix) + 52 + 8 = 64 characters.

use lattice_types::{Address, PublicKey};

use crate::CryptoError;

/// Base32 alphabet (32 chars, avoids visually ambiguous 0/O, 2/Z, l/I, v).
const BASE32_ALPHABET: &[u8; 32] = b"13456789abcdefghijkmnopqrstuwxyz";

/// Reverse lookup table: ASCII byte → 5-bit value (0xFF = invalid).
const BASE32_DECODE: [u8; 128] = {
    let mut table = [0xFFu8; 128];
    let alpha = BASE32_ALPHABET;
    let mut i = 0;
    while i < 32 {
        table[alpha[i] as usize] = i as u8;
        i += 1;
    }
    table
};

/// 52 public key characters followed by 8 checksum characters.
const ENCODED_LEN: usize = 60;
const PUBKEY_CHARS: usize = 52;

fn checksum(public_key: &[u8; 32]) -> [u8; 5] {
    let hash = crate::blake2b_256(public_key);
    let mut out = [0u8; 5];
    out.copy_from_slice(&hash[..5]);
    out
}

fn encode_base32(bytes: &[u8]) -> String {
    let total_bits = bytes.len() * 8;
    let num_chars = total_bits.div_ceil(5);
    let mut result = String::with_capacity(num_chars);

    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;

    for &byte in bytes {
        buffer = (buffer << 8) | byte as u64;
        bits_in_buffer += 8;
        while bits_in_buffer >= 5 {
            bits_in_buffer -= 5;
            let idx = ((buffer >> bits_in_buffer) & 0x1F) as usize;
            result.push(BASE32_ALPHABET[idx] as char);
        }
    }
    // Remaining bits (padded with zeros on the right).
    if bits_in_buffer > 0 {
        let idx = ((buffer << (5 - bits_in_buffer)) & 0x1F) as usize;
        result.push(BASE32_ALPHABET[idx] as char);
    }

    result
}

/// Decode a base32 string into a fixed-size byte array. Returns `None` on
/// invalid characters or wrong length. Zero-allocation.
fn decode_base32_fixed<const N: usize>(s: &str) -> Option<[u8; N]> {
    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;
    let mut result = [0u8; N];
    let mut pos = 0;

    for c in s.bytes() {
        if c >= 128 {
            return None;
        }
        let val = BASE32_DECODE[c as usize];
        if val == 0xFF {
            return None;
        }
        buffer = (buffer << 5) | val as u64;
        bits_in_buffer += 5;
        if bits_in_buffer >= 8 {
            bits_in_buffer -= 8;
            if pos < N {
                result[pos] = (buffer >> bits_in_buffer) as u8;
                pos += 1;
            }
        }
    }

    if pos < N {
        return None;
    }
    Some(result)
}

/// Derive the `lat_` address of a public key.
pub fn derive_address(public_key: &PublicKey) -> Address {
    Address::new(format!(
        "{}{}{}",
        Address::PREFIX,
        encode_base32(public_key.as_bytes()),
        encode_base32(&checksum(public_key.as_bytes()))
    ))
}

/// Extract the public key bytes from an address string.
///
/// Returns `None` if the address is malformed or has an invalid checksum.
pub fn decode_address(address: &str) -> Option<[u8; 32]> {
    let encoded = address.strip_prefix(Address::PREFIX)?;
    if encoded.len() != ENCODED_LEN {
        return None;
    }
    let (pubkey_encoded, checksum_encoded) = encoded.split_at(PUBKEY_CHARS);
    let pubkey_bytes: [u8; 32] = decode_base32_fixed(pubkey_encoded)?;
    let checksum_bytes: [u8; 5] = decode_base32_fixed(checksum_encoded)?;
    (checksum_bytes == checksum(&pubkey_bytes)).then_some(pubkey_bytes)
}

pub fn validate_address(address: &str) -> bool {
    decode_address(address).is_some()
}

/// The public key an address encodes.
pub fn public_key_of(address: &Address) -> Result<PublicKey, CryptoError> {
    decode_address(address.as_str())
        .map(PublicKey)
        .ok_or_else(|| CryptoError::InvalidAddress(address.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keypair, keypair_from_secret};

    #[test]
    fn derive_and_decode() {
        let kp = generate_keypair();
        let addr = derive_address(&kp.public);
        assert!(addr.as_str().starts_with("lat_"));
        assert_eq!(addr.as_str().len(), 64);
        assert_eq!(public_key_of(&addr).unwrap(), kp.public);
    }

    #[test]
    fn derive_is_deterministic() {
        let kp = keypair_from_secret(&[7u8; 32]);
        assert_eq!(derive_address(&kp.public), derive_address(&kp.public));
    }

    #[test]
    fn invalid_checksum_rejected() {
        let addr = derive_address(&generate_keypair().public);
        let mut bad = addr.as_str().to_string();
        let last = bad.pop().unwrap();
        bad.push(if last == '1' { '3' } else { '1' });
        assert!(!validate_address(&bad));
        assert!(public_key_of(&Address::new(bad)).is_err());
    }

    #[test]
    fn wrong_prefix_or_length_rejected() {
        assert!(!validate_address("lat_tooshort"));
        assert!(!validate_address("lat_"));
        let addr = derive_address(&generate_keypair().public);
        let foreign = addr.as_str().replacen("lat_", "xyz_", 1);
        assert!(!validate_address(&foreign));
    }

    #[test]
    fn base32_encode_decode_roundtrip() {
        let data = [0xDE, 0xAD, 0xBE, 0xEF, 0x42];
        let decoded: [u8; 5] = decode_base32_fixed(&encode_base32(&data)).unwrap();
        assert_eq!(decoded, data);
    }
}
