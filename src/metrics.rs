//! Observability metrics for save/open operations
//!
//! Tracks timing and size of the most recent save or open so callers can surface
//! or export them.

use serde::{Deserialize, Serialize};

/// Metrics for a single save or open
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetrics {
    /// Wall time of the whole operation in microseconds
    pub operation_time_micros: u64,

    /// Bytes of serialized metadata plus text (before compression)
    pub plaintext_size: u64,

    /// Bytes of gzip output (before encryption)
    pub compressed_size: u64,

    /// Bytes of ciphertext after the header
    pub payload_size: u64,

    /// Compression ratio (plaintext_size / compressed_size, >1.0 means compression helped)
    pub compression_ratio: f64,

    /// Minor format version written or read (None if no operation completed)
    pub format_minor: Option<u8>,

    /// Whether AES instructions were available
    pub hardware_accelerated: bool,
}

impl OperationMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        OperationMetrics {
            operation_time_micros: 0,
            plaintext_size: 0,
            compressed_size: 0,
            payload_size: 0,
            compression_ratio: 1.0,
            format_minor: None,
            hardware_accelerated: false,
        }
    }

    /// Set size metrics
    pub fn with_sizes(mut self, plaintext_size: u64, compressed_size: u64) -> Self {
        self.plaintext_size = plaintext_size;
        self.compressed_size = compressed_size;
        if compressed_size > 0 {
            self.compression_ratio = plaintext_size as f64 / compressed_size as f64;
        }
        self
    }

    pub fn with_payload_size(mut self, payload_size: u64) -> Self {
        self.payload_size = payload_size;
        self
    }

    pub fn with_timing(mut self, time_micros: u64, hw_accel: bool) -> Self {
        self.operation_time_micros = time_micros;
        self.hardware_accelerated = hw_accel;
        self
    }

    pub fn with_version(mut self, minor: u8) -> Self {
        self.format_minor = Some(minor);
        self
    }
}

impl Default for OperationMetrics {
    fn default() -> Self {
        Self::new()
    }
}
