//! Streaming AES-128-CBC with PKCS#7 padding
//!
//! The payload is written and read in a single pass, so the cipher works as a
//! stream adapter rather than on whole buffers:
//!
//! - [`CbcEncryptWriter`] wraps a sink, encrypts full blocks as they arrive and pads
//!   the final block in [`CbcEncryptWriter::finish`].
//! - [`CbcDecryptReader`] wraps a source and always holds back the last ciphertext
//!   block until the source reports end of data, because only then is it known to
//!   carry the padding. End of plaintext is therefore signalled by the cipher layer,
//!   not by a length field.
//!
//! Padding and block-alignment failures surface as `io::ErrorKind::InvalidData`
//! carrying a [`CipherError`]. Failures of the wrapped source are tagged with
//! [`SourceError`] so callers can tell a failing disk from a damaged file.

use aes::Aes128;
use cbc::cipher::block_padding::{Pkcs7, RawPadding};
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;
use std::io::{self, Read, Write};
use thiserror::Error;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
use std::arch::is_x86_feature_detected;

/// AES block size
pub const BLOCK_SIZE: usize = 16;

/// Length of the per-file IV
pub const IV_LEN: usize = 16;

/// Ciphertext read from the source per refill
const READ_CHUNK: usize = 8 * 1024;

/// Errors raised by the cipher layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("Invalid key length: expected 16 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Invalid IV length: expected 16 bytes, got {0}")]
    InvalidIvLength(usize),

    #[error("Ciphertext is not a whole number of blocks ({0} trailing bytes)")]
    PartialBlock(usize),

    #[error("Ciphertext is empty")]
    EmptyCiphertext,

    #[error("Invalid padding")]
    InvalidPadding,

    #[error("Random number generation failed")]
    RngFailure,
}

impl From<CipherError> for io::Error {
    fn from(err: CipherError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

/// An I/O error raised by the source beneath a [`CbcDecryptReader`].
#[derive(Debug)]
pub struct SourceError(pub io::Error);

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source read failed: {}", self.0)
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl SourceError {
    fn wrap(err: io::Error) -> io::Error {
        io::Error::new(err.kind(), SourceError(err))
    }

    /// Recover the original source error if `err` carries one.
    pub fn unwrap_from(err: io::Error) -> Result<io::Error, io::Error> {
        if !err
            .get_ref()
            .is_some_and(|inner| inner.is::<SourceError>())
        {
            return Err(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<SourceError>()) {
            Some(Ok(source)) => Ok(source.0),
            _ => Ok(io::Error::from(kind)),
        }
    }
}

/// Fill a fresh IV from the platform CSPRNG.
pub fn generate_iv() -> Result<[u8; IV_LEN], CipherError> {
    let rng = SystemRandom::new();
    let mut iv = [0u8; IV_LEN];
    rng.fill(&mut iv).map_err(|_| CipherError::RngFailure)?;
    Ok(iv)
}

/// Detect AES instruction support.
///
/// Informational only: the `aes` crate picks the fastest backend at runtime
/// regardless of this flag.
pub fn detect_hardware_acceleration() -> bool {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        #[cfg(target_feature = "aes")]
        return true;

        #[cfg(not(target_feature = "aes"))]
        {
            is_x86_feature_detected!("aes")
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        cfg!(target_feature = "aes") || cfg!(target_feature = "neon")
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
    false
}

/// Encrypting writer. Call [`finish`](Self::finish) to emit the padded final
/// block; dropping the writer without finishing leaves the ciphertext truncated.
pub struct CbcEncryptWriter<W: Write> {
    inner: W,
    cipher: cbc::Encryptor<Aes128>,
    pending: [u8; BLOCK_SIZE],
    pending_len: usize,
    out: Vec<u8>,
    plaintext_len: u64,
}

impl<W: Write> CbcEncryptWriter<W> {
    pub fn new(inner: W, key: &[u8], iv: &[u8]) -> Result<Self, CipherError> {
        if key.len() != 16 {
            return Err(CipherError::InvalidKeyLength(key.len()));
        }
        if iv.len() != IV_LEN {
            return Err(CipherError::InvalidIvLength(iv.len()));
        }
        let cipher = cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(|_| CipherError::InvalidKeyLength(key.len()))?;

        Ok(Self {
            inner,
            cipher,
            pending: [0u8; BLOCK_SIZE],
            pending_len: 0,
            out: Vec::with_capacity(READ_CHUNK),
            plaintext_len: 0,
        })
    }

    /// Plaintext bytes accepted so far (excluding padding)
    pub fn plaintext_len(&self) -> u64 {
        self.plaintext_len
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    fn encrypt_pending(&mut self) {
        let block = GenericArray::from_mut_slice(&mut self.pending);
        self.cipher.encrypt_block_mut(block);
        self.out.extend_from_slice(&self.pending);
        self.pending_len = 0;
    }

    /// Pad and encrypt the final block, flush, and hand back the wrapped sink.
    pub fn finish(mut self) -> io::Result<W> {
        Pkcs7::raw_pad(&mut self.pending, self.pending_len);
        self.encrypt_pending();
        self.inner.write_all(&self.out)?;
        self.out.clear();
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for CbcEncryptWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut input = buf;
        while !input.is_empty() {
            let take = (BLOCK_SIZE - self.pending_len).min(input.len());
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&input[..take]);
            self.pending_len += take;
            input = &input[take..];

            if self.pending_len == BLOCK_SIZE {
                self.encrypt_pending();
            }
        }

        if !self.out.is_empty() {
            self.inner.write_all(&self.out)?;
            self.out.clear();
        }
        self.plaintext_len += buf.len() as u64;
        Ok(buf.len())
    }

    /// Flushes the wrapped sink. A partial block stays buffered until more data or
    /// [`finish`](Self::finish).
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Decrypting reader. Reports end of data only after the final block's padding
/// has been validated and removed.
pub struct CbcDecryptReader<R: Read> {
    inner: R,
    cipher: cbc::Decryptor<Aes128>,
    raw: Vec<u8>,
    plain: Vec<u8>,
    pos: usize,
    finished: bool,
    failed: Option<CipherError>,
    plaintext_len: u64,
}

impl<R: Read> CbcDecryptReader<R> {
    pub fn new(inner: R, key: &[u8], iv: &[u8]) -> Result<Self, CipherError> {
        if key.len() != 16 {
            return Err(CipherError::InvalidKeyLength(key.len()));
        }
        if iv.len() != IV_LEN {
            return Err(CipherError::InvalidIvLength(iv.len()));
        }
        let cipher = cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(|_| CipherError::InvalidKeyLength(key.len()))?;

        Ok(Self {
            inner,
            cipher,
            raw: Vec::with_capacity(READ_CHUNK + BLOCK_SIZE),
            plain: Vec::with_capacity(READ_CHUNK),
            pos: 0,
            finished: false,
            failed: None,
            plaintext_len: 0,
        })
    }

    /// Plaintext bytes released so far
    pub fn plaintext_len(&self) -> u64 {
        self.plaintext_len
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn decrypt_into_plain(&mut self, len: usize) {
        for chunk in self.raw[..len].chunks_exact_mut(BLOCK_SIZE) {
            self.cipher.decrypt_block_mut(GenericArray::from_mut_slice(chunk));
        }
        self.plain.extend_from_slice(&self.raw[..len]);
        self.raw.drain(..len);
    }

    fn refill(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SourceError::wrap(e)),
            }
        };

        if n == 0 {
            return self.finish_stream();
        }

        self.raw.extend_from_slice(&chunk[..n]);
        // Keep at least one byte back: the last block may be the padded one
        let ready = (self.raw.len() - 1) / BLOCK_SIZE * BLOCK_SIZE;
        if ready > 0 {
            self.decrypt_into_plain(ready);
        }
        Ok(())
    }

    fn finish_stream(&mut self) -> io::Result<()> {
        self.finished = true;
        if let Err(err) = self.strip_final_block() {
            self.plain.clear();
            self.failed = Some(err.clone());
            return Err(err.into());
        }
        Ok(())
    }

    fn strip_final_block(&mut self) -> Result<(), CipherError> {
        match self.raw.len() {
            0 => return Err(CipherError::EmptyCiphertext),
            BLOCK_SIZE => {}
            n => return Err(CipherError::PartialBlock(n % BLOCK_SIZE)),
        }

        self.decrypt_into_plain(BLOCK_SIZE);
        let last_block = self.plain.len() - BLOCK_SIZE;
        let kept = Pkcs7::raw_unpad(&self.plain[last_block..])
            .map_err(|_| CipherError::InvalidPadding)?
            .len();
        self.plain.truncate(last_block + kept);
        Ok(())
    }
}

impl<R: Read> Read for CbcDecryptReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.pos < self.plain.len() {
                let n = (self.plain.len() - self.pos).min(buf.len());
                buf[..n].copy_from_slice(&self.plain[self.pos..self.pos + n]);
                self.pos += n;
                self.plaintext_len += n as u64;
                return Ok(n);
            }
            if let Some(err) = &self.failed {
                return Err(err.clone().into());
            }
            if self.finished {
                return Ok(0);
            }
            self.plain.clear();
            self.pos = 0;
            self.refill()?;
        }
    }
}
