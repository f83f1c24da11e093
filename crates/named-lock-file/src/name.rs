//! Lock name to file name conversion.

use std::path::{Path, PathBuf};

use named_lock_core::error::{LockError, LockResult};
use sha2::{Digest, Sha512};

/// Portable file name length (includes hash and extension).
const PORTABLE_FILE_NAME_LENGTH: usize = 64;

/// Hash length in Base32 characters (160 bits / 5 bits per char).
const HASH_LENGTH_IN_CHARS: usize = 32;

/// Base32 alphabet (RFC 4648).
const BASE32_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

const EXTENSION: &str = ".lock";

/// Converts a lock name to the path of its lock file inside `directory`.
///
/// # Rules
///
/// - Alphanumeric characters and `_` are kept, everything else becomes `_`
/// - The readable part is truncated so the file name stays portable
/// - A Base32 hash of the full name is appended, keeping names that differ
///   only in replaced characters or letter case apart
pub fn get_lock_file_name(directory: &Path, name: &str) -> LockResult<PathBuf> {
    if name.is_empty() {
        return Err(LockError::InvalidName(
            "lock name cannot be empty".to_string(),
        ));
    }

    let prefix_len = PORTABLE_FILE_NAME_LENGTH - HASH_LENGTH_IN_CHARS - EXTENSION.len();
    let base_name: String = convert_to_valid_base_name(name)
        .chars()
        .take(prefix_len)
        .collect();
    let name_hash = compute_hash(name.as_bytes());

    Ok(directory.join(format!("{base_name}{name_hash}{EXTENSION}")))
}

fn convert_to_valid_base_name(name: &str) -> String {
    const REPLACEMENT_CHAR: char = '_';

    name.chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ch == REPLACEMENT_CHAR {
                ch
            } else {
                REPLACEMENT_CHAR
            }
        })
        .collect()
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
