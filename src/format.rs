//! Document file format: header framing and the save/open pipeline.
//!
//! On-disk layout (integers big-endian):
//!
//! ```text
//! [signature: 4][format: 1][minor: 1][check: 2][iv: 16][payload...]
//! payload = AES-128-CBC(gzip(save_history ‖ text))
//! ```
//!
//! Save always writes [`FormatVersion::CURRENT`]. Open accepts every
//! [`FormatVersion`] and dispatches once on it for the password check and the text
//! encoding.
//!
//! Stream layers, outermost first: gzip, cipher, buffering, caller's sink/source.
//! On save each layer is finished in that order. A failure is remembered and the
//! remaining layers are still closed; the first failure is returned and later ones
//! are logged.

use crate::compression::{self, DEFAULT_COMPRESSION_LEVEL, MAX_TEXT_SIZE};
use crate::document::Document;
use crate::encryption::core::detect_hardware_acceleration;
use crate::encryption::{
    compute_check, derive_key, generate_iv, verify, CbcDecryptReader, CbcEncryptWriter,
    BLOCK_SIZE, CHECK_LEN, IV_LEN,
};
use crate::error::{CorruptionError, DocError, FormatError, PasswordError, Result};
use crate::metadata::{read_history, record_save, write_history, DocumentMetadata, SaveStamp};
use crate::metrics::OperationMetrics;
use crate::short_string::read_short_string;
use crate::version::{FormatVersion, TextEncoding, FORMAT_VERSION};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};

/// Magic bytes at the start of every document file
pub const SIGNATURE: [u8; 4] = *b"ENOT";

/// Initial capacity cap when reading a length-prefixed text
const MAX_TEXT_PREALLOCATION: u64 = 1024 * 1024;

/// Plaintext file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub format_version: u8,
    pub version: FormatVersion,
    pub check: [u8; CHECK_LEN],
    pub iv: [u8; IV_LEN],
}

impl FileHeader {
    pub const SIZE: usize = SIGNATURE.len() + 2 + CHECK_LEN + IV_LEN;

    /// Header for a file written by this build
    pub fn new(check: [u8; CHECK_LEN], iv: [u8; IV_LEN]) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            version: FormatVersion::CURRENT,
            check,
            iv,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&SIGNATURE);
        bytes[4] = self.format_version;
        bytes[5] = self.version.minor();
        bytes[6..8].copy_from_slice(&self.check);
        bytes[8..24].copy_from_slice(&self.iv);
        bytes
    }

    /// Validate header bytes in file order.
    ///
    /// `bytes` may be short (a truncated file). Checks run in the order the fields
    /// appear, so a bad signature or version is reported even when the rest of the
    /// header is missing.
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, FormatError> {
        if bytes.len() < SIGNATURE.len() || bytes[..SIGNATURE.len()] != SIGNATURE {
            return Err(FormatError::BadSignature);
        }

        let format_version = *bytes.get(4).ok_or(FormatError::TruncatedHeader)?;
        if format_version > FORMAT_VERSION {
            return Err(FormatError::UnsupportedFormat {
                found: format_version,
                supported: FORMAT_VERSION,
            });
        }

        let minor = *bytes.get(5).ok_or(FormatError::TruncatedHeader)?;
        if minor > FormatVersion::MAX_MINOR {
            return Err(FormatError::VersionTooNew {
                found: minor,
                supported: FormatVersion::MAX_MINOR,
            });
        }
        let version = FormatVersion::from_minor(minor)?;

        if bytes.len() < Self::SIZE {
            return Err(FormatError::TruncatedHeader);
        }
        let mut check = [0u8; CHECK_LEN];
        check.copy_from_slice(&bytes[6..8]);
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&bytes[8..24]);

        Ok(Self {
            format_version,
            version,
            check,
            iv,
        })
    }

    /// Read and validate a header from `reader`
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut bytes = [0u8; Self::SIZE];
        let mut filled = 0;
        while filled < Self::SIZE {
            match reader.read(&mut bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Self::parse(&bytes[..filled])?)
    }
}

/// Tunables for [`DocumentFormat`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    /// Deflate level, 0..=9 (higher values are clamped)
    pub compression_level: u32,
    /// Largest text accepted on save and declared text length accepted on open
    pub max_text_size: usize,
}

impl FormatOptions {
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(compression::MAX_COMPRESSION_LEVEL);
        self
    }

    pub fn with_max_text_size(mut self, max: usize) -> Self {
        self.max_text_size = max;
        self
    }
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            max_text_size: MAX_TEXT_SIZE,
        }
    }
}

/// Collects the first failure across stream teardown; later ones are logged.
#[derive(Default)]
struct Teardown {
    first: Option<DocError>,
}

impl Teardown {
    fn record<T>(&mut self, stage: &'static str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                if self.first.is_none() {
                    self.first = Some(err);
                } else {
                    warn!(stage, error = %err, "suppressed error while closing document stream");
                }
                None
            }
        }
    }

    fn finish(self) -> Result<()> {
        match self.first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Save/open orchestrator
pub struct DocumentFormat {
    options: FormatOptions,
    hardware_acceleration_detected: bool,
    /// Last operation metrics (interior mutability for observability)
    last_metrics: Arc<Mutex<OperationMetrics>>,
}

impl DocumentFormat {
    pub fn new(options: FormatOptions) -> Self {
        Self {
            options,
            hardware_acceleration_detected: detect_hardware_acceleration(),
            last_metrics: Arc::new(Mutex::new(OperationMetrics::new())),
        }
    }

    pub fn options(&self) -> &FormatOptions {
        &self.options
    }

    /// Save `document` to `sink` as the current user, now.
    pub fn save<W: Write>(&self, document: &mut Document, sink: W) -> Result<()> {
        self.save_with_stamp(document, sink, &SaveStamp::current())
    }

    /// Save `document` to `sink`, recording the save as `stamp`.
    ///
    /// The save history is updated before any byte is written. Partial output is
    /// not rolled back on failure; write to a temporary file and rename for
    /// atomic replacement.
    pub fn save_with_stamp<W: Write>(
        &self,
        document: &mut Document,
        sink: W,
        stamp: &SaveStamp,
    ) -> Result<()> {
        let start = Instant::now();
        let key = document
            .metadata
            .key
            .as_ref()
            .ok_or(PasswordError::KeyNotSet)?;

        let text = document.text.as_bytes();
        let text_len = u32::try_from(text.len())
            .ok()
            .filter(|len| (*len as usize) <= self.options.max_text_size)
            .ok_or_else(|| {
                DocError::Encode(format!(
                    "text of {} bytes exceeds limit of {} bytes",
                    text.len(),
                    self.options.max_text_size
                ))
            })?;

        // Serialize the metadata block up front so an unencodable username fails
        // before the sink is touched and before the history is changed.
        let history = record_save(document.metadata.save_history.clone(), stamp);
        let mut block = Vec::new();
        write_history(&mut block, &history).map_err(DocError::from_payload_write)?;
        block.extend_from_slice(&text_len.to_be_bytes());
        document.metadata.save_history = history;

        let iv = generate_iv().map_err(DocError::Crypto)?;
        let header = FileHeader::new(compute_check(key, &iv), iv);

        let mut buffered = BufWriter::new(sink);
        buffered.write_all(&header.to_bytes())?;

        let cipher = CbcEncryptWriter::new(buffered, key.cipher_key(), &iv)
            .map_err(DocError::Crypto)?;
        let mut gz = compression::encoder(cipher, self.options.compression_level);

        let mut teardown = Teardown::default();
        teardown.record(
            "payload",
            gz.write_all(&block)
                .and_then(|_| gz.write_all(text))
                .map_err(DocError::from_payload_write),
        );

        let mut compressed_size = 0;
        if let Some(cipher) = teardown.record("compressor", gz.finish().map_err(DocError::Io)) {
            compressed_size = cipher.plaintext_len();
            let finished = cipher.finish().map_err(DocError::Io);
            if let Some(mut buffered) = teardown.record("cipher", finished) {
                teardown.record("sink", buffered.flush().map_err(DocError::Io));
            }
        }
        teardown.finish()?;

        let plaintext_size = (block.len() + text.len()) as u64;
        self.update_metrics(start, plaintext_size, compressed_size, FormatVersion::CURRENT);
        debug!(
            version = %FormatVersion::CURRENT,
            text_bytes = text.len(),
            compressed_bytes = compressed_size,
            records = document.metadata.save_history.len(),
            "document saved"
        );
        Ok(())
    }

    /// Open a document from `source` with `password`.
    ///
    /// `origin` is the path the source was opened from; it is recorded as the
    /// document's absolute filename.
    pub fn open<R: Read>(
        &self,
        source: R,
        password: &str,
        origin: Option<&Path>,
    ) -> Result<Document> {
        let start = Instant::now();
        let mut buffered = BufReader::new(source);
        let header = FileHeader::read_from(&mut buffered)?;

        let key = derive_key(password);
        if !verify(&key, &header.iv, &header.check, header.version) {
            debug!(version = %header.version, "password check failed");
            return Err(PasswordError::InvalidPassword.into());
        }

        let cipher = CbcDecryptReader::new(&mut buffered, key.cipher_key(), &header.iv)
            .map_err(DocError::Crypto)?;
        let mut gz = CountingReader::new(compression::decoder(cipher));

        let save_history = read_history(&mut gz).map_err(DocError::from_payload_read)?;
        let text = self.read_text(&mut gz, header.version)?;

        let extra = compression::ensure_end(&mut gz).map_err(DocError::from_payload_read)?;
        if extra > 0 {
            return Err(CorruptionError::TrailingData(extra).into());
        }
        let plaintext_size = gz.count;

        // Drain the cipher layer so the final block's padding is checked; nothing
        // may follow the gzip member.
        let (trailing, cipher) =
            compression::finish_decoder(gz.inner).map_err(DocError::from_payload_read)?;
        if trailing > 0 {
            return Err(CorruptionError::TrailingData(trailing as usize).into());
        }
        let compressed_size = cipher.plaintext_len();

        self.update_metrics(start, plaintext_size, compressed_size, header.version);
        debug!(
            version = %header.version,
            text_bytes = text.len(),
            records = save_history.len(),
            "document opened"
        );

        let metadata = DocumentMetadata {
            key: Some(key),
            save_history,
            filename: origin.map(absolute_path),
        };
        Ok(Document::from_parts(text, metadata))
    }

    fn read_text<R: Read>(&self, reader: &mut R, version: FormatVersion) -> Result<String> {
        match version.text_encoding() {
            TextEncoding::ShortString => {
                read_short_string(reader).map_err(DocError::from_payload_read)
            }
            TextEncoding::LengthPrefixed => {
                let mut len = [0u8; 4];
                reader
                    .read_exact(&mut len)
                    .map_err(DocError::from_payload_read)?;
                let len = u32::from_be_bytes(len) as u64;
                if len > self.options.max_text_size as u64 {
                    return Err(CorruptionError::TextTooLarge {
                        len,
                        max: self.options.max_text_size,
                    }
                    .into());
                }

                // A single read may return fewer bytes; take() + read_to_end loops
                // until the declared count or end of stream.
                let mut bytes = Vec::with_capacity(len.min(MAX_TEXT_PREALLOCATION) as usize);
                reader
                    .by_ref()
                    .take(len)
                    .read_to_end(&mut bytes)
                    .map_err(DocError::from_payload_read)?;
                if (bytes.len() as u64) < len {
                    return Err(CorruptionError::Truncated.into());
                }

                String::from_utf8(bytes)
                    .map_err(|e| CorruptionError::InvalidText(e.to_string()).into())
            }
        }
    }

    /// Create (or truncate) `path` and save `document` into it.
    pub fn save_file(&self, document: &mut Document, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        self.save(document, file)
    }

    /// Open the document stored at `path`.
    pub fn open_file(&self, path: impl AsRef<Path>, password: &str) -> Result<Document> {
        let path = path.as_ref();
        let file = File::open(path)?;
        self.open(file, password, Some(path))
    }

    /// Get metrics from the last successful save or open
    pub fn get_last_metrics(&self) -> OperationMetrics {
        self.last_metrics
            .lock()
            .map(|metrics| metrics.clone())
            .unwrap_or_else(|_| OperationMetrics::new())
    }

    fn update_metrics(
        &self,
        start: Instant,
        plaintext_size: u64,
        compressed_size: u64,
        version: FormatVersion,
    ) {
        let micros = start.elapsed().as_micros() as u64;
        // PKCS#7 always adds between 1 and 16 bytes
        let block = BLOCK_SIZE as u64;
        let payload_size = (compressed_size / block + 1) * block;
        if let Ok(mut metrics) = self.last_metrics.lock() {
            *metrics = OperationMetrics::new()
                .with_sizes(plaintext_size, compressed_size)
                .with_payload_size(payload_size)
                .with_timing(micros, self.hardware_acceleration_detected)
                .with_version(version.minor());
        }
    }
}

impl Default for DocumentFormat {
    fn default() -> Self {
        Self::new(FormatOptions::default())
    }
}

/// Counts the plaintext bytes pulled through the decompressor
struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R: Read> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
