//! Gzip layer between the document payload and the cipher stream.
//!
//! The compressor writes into a [`CbcEncryptWriter`](crate::encryption::CbcEncryptWriter)
//! and the decompressor reads from a
//! [`CbcDecryptReader`](crate::encryption::CbcDecryptReader). The gzip member carries
//! no outer length: the decompressor stops at the gzip trailer and the cipher layer
//! reports end of data once padding is removed. Anything the cipher yields after
//! the gzip member is reported by [`finish_decoder`].
//!
//! Security limits:
//! - 512MB default cap on the declared text length (decompression bomb protection)
//! - gzip CRC32 and size trailer verified before an open succeeds

use flate2::bufread::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, BufReader, Read, Write};

/// Default cap on the text length accepted from a length prefix (512MB)
pub const MAX_TEXT_SIZE: usize = 512 * 1024 * 1024;

/// Default deflate level
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Highest deflate level
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

/// Wrap `inner` in a gzip compressor at `level` (clamped to 0..=9).
pub fn encoder<W: Write>(inner: W, level: u32) -> GzEncoder<W> {
    GzEncoder::new(inner, Compression::new(level.min(MAX_COMPRESSION_LEVEL)))
}

/// Wrap `inner` in a gzip decompressor.
///
/// The decoder consumes exactly one gzip member from the buffer; bytes after the
/// trailer stay in the `BufReader` for [`finish_decoder`].
pub fn decoder<R: Read>(inner: R) -> GzDecoder<BufReader<R>> {
    GzDecoder::new(BufReader::new(inner))
}

/// Tear down a decoder whose member has been read to the end.
///
/// Drains whatever follows the gzip member, both the bytes already buffered and
/// the rest of `inner`, and returns their count along with `inner`.
pub fn finish_decoder<R: Read>(decoder: GzDecoder<BufReader<R>>) -> io::Result<(u64, R)> {
    let mut rest = decoder.into_inner();
    let trailing = io::copy(&mut rest, &mut io::sink())?;
    Ok((trailing, rest.into_inner()))
}

/// Require that `reader` has nothing left to yield.
///
/// Reading past the last expected byte forces the decompressor to consume and
/// verify the gzip trailer. Returns the number of unexpected bytes found (0 when
/// the stream ended cleanly).
pub fn ensure_end<R: Read>(reader: &mut R) -> io::Result<usize> {
    let mut scratch = [0u8; 64];
    let mut extra = 0;
    loop {
        match reader.read(&mut scratch) {
            Ok(0) => return Ok(extra),
            Ok(n) => extra += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
