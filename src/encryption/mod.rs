//! Password-based encryption of the document payload
//!
//! - SHA-1 key derivation from the password (20-byte key, stable across versions)
//! - Version-dependent 2-byte password check stored in the header
//! - AES-128-CBC with PKCS#7 padding as a streaming writer/reader pair
//! - Per-file random IV from the platform CSPRNG (`ring::rand::SystemRandom`)

pub mod core;
pub mod key_derivation;
pub mod verifier;

// Re-exports for convenience
pub use self::core::{
    generate_iv, CbcDecryptReader, CbcEncryptWriter, CipherError, SourceError, BLOCK_SIZE, IV_LEN,
};
pub use key_derivation::{derive_key, DocumentKey, CIPHER_KEY_LEN, KEY_LEN};
pub use verifier::{compute_check, verify, CHECK_LEN};
