//! # sealdoc-core
//!
//! Password-protected, gzip-compressed, versioned text documents.
//!
//! A document is a UTF-8 text plus metadata (derived key, save history, origin
//! path). Saving writes a small plaintext header followed by
//! `AES-128-CBC(gzip(save_history ‖ text))`. Opening verifies the password against
//! a 2-byte check in the header before touching the payload.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sealdoc_core::Document;
//!
//! let mut doc = Document::with_text("Meeting notes");
//! doc.set_password("correct horse");
//! doc.save_file("notes.enc").unwrap();
//!
//! let mut reopened = Document::new();
//! reopened.open_file("notes.enc", "correct horse").unwrap();
//! assert_eq!(reopened.text(), "Meeting notes");
//! ```
//!
//! ## Format Versions
//!
//! | Minor | Password check | Text encoding | Written |
//! |:-----:|:---------------|:--------------|:-------:|
//! | 0 | key bytes 17..19 (legacy, insecure) | short string (max 65535 bytes) | No |
//! | 1 | `SHA-1(key ‖ iv)[0..2]` | short string | No |
//! | 2 | `SHA-1(key ‖ iv)[0..2]` | `u32` length + UTF-8 | Yes |
//!
//! ## Security Properties
//!
//! - **Key derivation**: unsalted SHA-1 of the password, kept for file compatibility
//! - **Password check**: 2 bytes, so 1 in 65536 wrong passwords pass it and fail
//!   later as corruption
//! - **No authentication**: AES-CBC without a MAC; tampering shows up only as
//!   padding, decompression or decoding errors
//! - **Memory safety**: `zeroize` on drop for key material

// Metrics and observability
pub mod metrics;
pub use metrics::OperationMetrics;

pub mod error;
pub use error::{CorruptionError, DocError, FormatError, PasswordError, Result};

pub mod version;
pub use version::{FormatVersion, FORMAT_VERSION};

pub mod compression;
pub mod encryption;
pub mod short_string;

pub mod metadata;
pub use metadata::{DocumentMetadata, SaveRecord, SaveStamp};

// Save/open pipeline
pub mod format;
pub use format::{DocumentFormat, FileHeader, FormatOptions, SIGNATURE};

pub mod document;
pub use document::Document;
