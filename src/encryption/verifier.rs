//! Password check stored in the file header
//!
//! The check is two bytes: a cheap pre-check that rejects a wrong password before
//! the payload is decrypted. It is not an authentication tag. A wrong password is
//! accepted with probability 1/65536 and then fails later as corruption (bad
//! padding, invalid deflate data or a gzip CRC mismatch).
//!
//! Changing the check length changes the on-disk format and needs a new minor
//! version.

use super::key_derivation::{DocumentKey, KEY_LEN};
use crate::version::{CheckAlgorithm, FormatVersion};
use sha1::{Digest, Sha1};

/// Length of the header password check
pub const CHECK_LEN: usize = 2;

/// Compute the check written by the current format version: `SHA-1(key ‖ iv)[0..2]`.
pub fn compute_check(key: &DocumentKey, iv: &[u8; 16]) -> [u8; CHECK_LEN] {
    key_iv_digest(key, iv)
}

/// Verify a stored check against a candidate key using the algorithm of `version`.
pub fn verify(
    key: &DocumentKey,
    iv: &[u8; 16],
    stored: &[u8; CHECK_LEN],
    version: FormatVersion,
) -> bool {
    let expected = match version.check_algorithm() {
        CheckAlgorithm::LegacyKeySlice => legacy_key_slice(key),
        CheckAlgorithm::KeyIvDigest => key_iv_digest(key, iv),
    };
    expected == *stored
}

fn key_iv_digest(key: &DocumentKey, iv: &[u8; 16]) -> [u8; CHECK_LEN] {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(iv);
    let digest = hasher.finalize();
    [digest[0], digest[1]]
}

/// INSECURE legacy check: bytes 17 and 18 of the key, independent of the IV.
///
/// Any v0 file leaks the same two key bytes for a given password. Only ever used
/// to read v0 files; nothing writes it.
fn legacy_key_slice(key: &DocumentKey) -> [u8; CHECK_LEN] {
    let bytes = key.as_bytes();
    [bytes[KEY_LEN - 3], bytes[KEY_LEN - 2]]
}
