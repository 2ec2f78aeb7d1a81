//! Test fixtures and constants for sealdoc-core tests.
//!
//! The file builders below assemble documents layer by layer from the crate's
//! public codecs, so tests can produce files this build never writes (minor
//! versions 0 and 1) and payloads that are deliberately malformed.

#![allow(dead_code)]

use sealdoc_core::compression;
use sealdoc_core::encryption::{compute_check, derive_key, CbcEncryptWriter};
use sealdoc_core::metadata::{write_history, SaveRecord};
use sealdoc_core::short_string::write_short_string;
use sealdoc_core::{FileHeader, FormatVersion, FORMAT_VERSION};
use std::io::Write;

// ============================================================================
// Common Test Data
// ============================================================================

pub const PASSWORD: &str = "correct horse";

/// Fails the check of `PASSWORD` under both check algorithms for `TEST_IV`
pub const WRONG_PASSWORD: &str = "wrong horse";

pub const SMALL_TEXT: &str = "hello world";

/// Multi-byte UTF-8, an embedded NUL and a supplementary-plane character
pub const UNICODE_TEXT: &str = "Hello 世界 \u{0} 🚀 Rust";

/// Fixed IV so header bytes are reproducible
pub const TEST_IV: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
    0x0f,
];

/// Check bytes of `PASSWORD` with `TEST_IV`
pub const LEGACY_CHECK: [u8; 2] = [0x35, 0xdb];
pub const CURRENT_CHECK: [u8; 2] = [0x59, 0xca];

pub fn sample_history() -> Vec<SaveRecord> {
    vec![
        SaveRecord::new(1_500_000_000_000, "alice"),
        SaveRecord::new(1_600_000_000_000, "bob"),
    ]
}

// ============================================================================
// File Builders
// ============================================================================

/// Header bytes for `password` at `version`, computing the check the way that
/// version does.
pub fn header_bytes(version: FormatVersion, password: &str, iv: [u8; 16]) -> Vec<u8> {
    let key = derive_key(password);
    let check = match version {
        FormatVersion::V0 => [key.as_bytes()[17], key.as_bytes()[18]],
        _ => compute_check(&key, &iv),
    };
    let header = FileHeader {
        format_version: FORMAT_VERSION,
        version,
        check,
        iv,
    };
    header.to_bytes().to_vec()
}

/// Uncompressed payload: history then text in the encoding of `version`
pub fn plaintext_payload(version: FormatVersion, history: &[SaveRecord], text: &str) -> Vec<u8> {
    let mut out = Vec::new();
    write_history(&mut out, history).unwrap();
    match version {
        FormatVersion::V0 | FormatVersion::V1 => write_short_string(&mut out, text).unwrap(),
        FormatVersion::V2 => {
            out.extend_from_slice(&(text.len() as u32).to_be_bytes());
            out.extend_from_slice(text.as_bytes());
        }
    }
    out
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = compression::encoder(Vec::new(), compression::DEFAULT_COMPRESSION_LEVEL);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Header followed by `payload` encrypted under `password`
pub fn seal(version: FormatVersion, password: &str, iv: [u8; 16], payload: &[u8]) -> Vec<u8> {
    let key = derive_key(password);
    let mut writer = CbcEncryptWriter::new(header_bytes(version, password, iv), key.cipher_key(), &iv)
        .unwrap();
    writer.write_all(payload).unwrap();
    writer.finish().unwrap()
}

/// A well-formed document file of any version
pub fn build_document_file(
    version: FormatVersion,
    password: &str,
    history: &[SaveRecord],
    text: &str,
) -> Vec<u8> {
    seal(
        version,
        password,
        TEST_IV,
        &gzip(&plaintext_payload(version, history, text)),
    )
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Deterministic printable text that compresses poorly
pub fn generate_incompressible_text(size: usize, seed: u64) -> String {
    let mut rng = SimplePcg::new(seed);
    (0..size)
        .map(|_| (b'!' + rng.next_byte() % 94) as char)
        .collect()
}

/// Deterministic highly repetitive text
pub fn generate_repetitive_text(size: usize) -> String {
    "lorem ipsum dolor sit amet "
        .chars()
        .cycle()
        .take(size)
        .collect()
}

// Simple PCG random number generator (deterministic, not crypto-secure)
struct SimplePcg {
    state: u64,
}

impl SimplePcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_byte(&mut self) -> u8 {
        let old_state = self.state;
        self.state = old_state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let xor_shifted = (((old_state >> 18) ^ old_state) >> 27) as u32;
        let rot = (old_state >> 59) as u32;
        (xor_shifted.rotate_right(rot) & 0xff) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_checks_match_builder() {
        let legacy = header_bytes(FormatVersion::V0, PASSWORD, TEST_IV);
        let current = header_bytes(FormatVersion::V1, PASSWORD, TEST_IV);

        assert_eq!(legacy[6..8], LEGACY_CHECK);
        assert_eq!(current[6..8], CURRENT_CHECK);
        assert_ne!(
            header_bytes(FormatVersion::V0, WRONG_PASSWORD, TEST_IV)[6..8],
            LEGACY_CHECK
        );
        assert_ne!(
            header_bytes(FormatVersion::V1, WRONG_PASSWORD, TEST_IV)[6..8],
            CURRENT_CHECK
        );
    }

    #[test]
    fn test_generate_incompressible_text() {
        let a = generate_incompressible_text(1000, 12345);
        let b = generate_incompressible_text(1000, 12345);
        let c = generate_incompressible_text(1000, 54321);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 1000);
        assert!(a.is_ascii());
    }
}
