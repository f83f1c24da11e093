//! MySQL lock name encoding.
//!
//! `GET_LOCK` rejects names longer than 64 characters and empty names. Names
//! that fit are used unchanged; others keep a readable prefix and end with a
//! hash of the full name so distinct names stay distinct.

use sha2::{Digest, Sha512};

/// Maximum length for MySQL lock names.
pub const MAX_NAME_LENGTH: usize = 64;

/// Name used for the empty lock name.
const EMPTY_NAME: &str = "__empty__";

/// Base32 hash length (160 bits at 5 bits per character).
const HASH_LENGTH_IN_CHARS: usize = 32;

const BASE32_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Encodes a lock name to be safe for MySQL `GET_LOCK`.
pub fn encode_lock_name(name: &str) -> String {
    if name.is_empty() {
        return EMPTY_NAME.to_string();
    }
    if name.chars().count() <= MAX_NAME_LENGTH {
        return name.to_string();
    }

    let prefix: String = name
        .chars()
        .take(MAX_NAME_LENGTH - HASH_LENGTH_IN_CHARS)
        .collect();
    format!("{}{}", prefix, compute_hash(name.as_bytes()))
}

/// SHA-512 truncated to 160 bits, Base32 encoded.
fn compute_hash(bytes: &[u8]) -> String {
    let hash_bytes = Sha512::digest(bytes);

    let mut chars = String::with_capacity(HASH_LENGTH_IN_CHARS);
    let mut bit_buffer = 0u32;
    let mut bits_remaining = 0u32;

    for &byte in &hash_bytes[..20] {
        bit_buffer |= (byte as u32) << bits_remaining;
        bits_remaining += 8;

        while bits_remaining >= 5 {
            chars.push(BASE32_ALPHABET[(bit_buffer & 0x1f) as usize] as char);
            bit_buffer >>= 5;
            bits_remaining -= 5;
        }
    }

    chars
}
