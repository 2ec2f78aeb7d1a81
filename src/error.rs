//! Error taxonomy for document save/open.
//!
//! Callers need to tell four situations apart:
//! - [`FormatError`]: not one of our files, or a version this build cannot read.
//!   Reject the file.
//! - [`PasswordError`]: wrong password (or no key set before saving). Re-prompt.
//! - [`CorruptionError`]: the password check passed but the payload does not
//!   decode. Either the file is damaged or the 2-byte check false-accepted.
//! - `Io`: the sink or source itself failed. Passed through unchanged.
//!
//! Messages never include passwords or key material.

use crate::encryption::{CipherError, SourceError};
use crate::short_string::ShortStringError;
use std::io;
use thiserror::Error;

/// Result type for document operations
pub type Result<T> = std::result::Result<T, DocError>;

/// The file is not readable by this format implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("File is not a valid document file")]
    BadSignature,

    #[error("File header is truncated")]
    TruncatedHeader,

    #[error("Unsupported format version {found} (this build reads up to {supported})")]
    UnsupportedFormat { found: u8, supported: u8 },

    #[error("Format version {found} is newer than this build supports (up to {supported})")]
    VersionTooNew { found: u8, supported: u8 },

    #[error("Unsupported minor version {0}")]
    UnsupportedMinorVersion(u8),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Key not set in document metadata")]
    KeyNotSet,

    #[error("Invalid password")]
    InvalidPassword,
}

/// The payload failed to decode after the password check passed
#[derive(Error, Debug)]
pub enum CorruptionError {
    #[error("Cipher stream corrupt: {0}")]
    Cipher(#[from] CipherError),

    #[error("Compressed stream corrupt: {0}")]
    Decompression(String),

    #[error("Payload ends before all declared data was read")]
    Truncated,

    #[error("Text is not valid: {0}")]
    InvalidText(String),

    #[error("Declared text length {len} exceeds limit of {max} bytes")]
    TextTooLarge { len: u64, max: usize },

    #[error("Unexpected {0} bytes after document text")]
    TrailingData(usize),
}

#[derive(Error, Debug)]
pub enum DocError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Corrupt(#[from] CorruptionError),

    /// A value in the document cannot be represented in the file format
    #[error("Cannot encode document: {0}")]
    Encode(String),

    /// Cipher setup failed while saving
    #[error("Encryption setup failed: {0}")]
    Crypto(CipherError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl DocError {
    pub fn is_format_error(&self) -> bool {
        matches!(self, DocError::Format(_))
    }

    pub fn is_password_error(&self) -> bool {
        matches!(self, DocError::Password(_))
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, DocError::Corrupt(_))
    }

    /// Classify an I/O error raised while reading the encrypted payload.
    ///
    /// Errors from the underlying source stay `Io`; everything produced by the
    /// cipher, decompression or decoding layers is corruption.
    pub(crate) fn from_payload_read(err: io::Error) -> Self {
        let err = match SourceError::unwrap_from(err) {
            Ok(source) => return DocError::Io(source),
            Err(err) => err,
        };

        if let Some(inner) = err.get_ref() {
            if let Some(cipher) = inner.downcast_ref::<CipherError>() {
                return CorruptionError::Cipher(cipher.clone()).into();
            }
            if let Some(text) = inner.downcast_ref::<ShortStringError>() {
                return CorruptionError::InvalidText(text.to_string()).into();
            }
        }

        match err.kind() {
            io::ErrorKind::UnexpectedEof => CorruptionError::Truncated.into(),
            _ => CorruptionError::Decompression(err.to_string()).into(),
        }
    }

    /// Classify an I/O error raised while writing the encrypted payload.
    pub(crate) fn from_payload_write(err: io::Error) -> Self {
        match err.get_ref().and_then(|e| e.downcast_ref::<ShortStringError>()) {
            Some(text) => DocError::Encode(text.to_string()),
            None => DocError::Io(err),
        }
    }
}
