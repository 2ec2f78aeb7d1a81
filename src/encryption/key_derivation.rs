//! Password to key derivation
//!
//! Every format version derives the same 20-byte key from a password: the SHA-1
//! digest of the password's UTF-8 bytes. Versions only differ in how the header's
//! password check is computed from that key (see [`super::verifier`]).
//!
//! The first 16 bytes of the key are the AES-128 cipher key. All 20 bytes feed the
//! password check.

use sha1::{Digest, Sha1};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a derived key (SHA-1 output)
pub const KEY_LEN: usize = 20;

/// Number of key bytes used as the AES-128 key
pub const CIPHER_KEY_LEN: usize = 16;

/// Key material derived from a document password.
///
/// Zeroized on drop. `Clone` is intentionally not derived so the key lives in
/// exactly one place: the metadata of the document it unlocks.
#[derive(PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DocumentKey([u8; KEY_LEN]);

impl DocumentKey {
    /// Wrap raw key bytes (e.g. a key held by the caller from an earlier derivation)
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// All 20 key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// The AES-128 key: the first 16 bytes of the derived key
    pub fn cipher_key(&self) -> &[u8] {
        &self.0[..CIPHER_KEY_LEN]
    }
}

impl fmt::Debug for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DocumentKey([REDACTED])")
    }
}

/// Derive the document key for `password`.
///
/// Deterministic and side-effect free. Note that this is a single unsalted hash,
/// kept for compatibility with every existing file; it offers no resistance to
/// offline guessing beyond the cost of one SHA-1.
pub fn derive_key(password: &str) -> DocumentKey {
    let digest = Sha1::digest(password.as_bytes());
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&digest);
    DocumentKey(key)
}
