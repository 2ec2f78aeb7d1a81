//! Short strings: a big-endian u16 byte count followed by modified UTF-8.
//!
//! Used for usernames in the save history and for the document text of v0/v1
//! files. Modified UTF-8 differs from standard UTF-8 in two ways: U+0000 is written
//! as the two bytes `C0 80`, and characters outside the BMP are written as a UTF-16
//! surrogate pair with each half encoded in three bytes. The encoded form is
//! limited to 65535 bytes.

use std::io::{self, Read, Write};
use thiserror::Error;

/// Largest encoded length a short string can carry
pub const MAX_SHORT_STRING_LEN: usize = u16::MAX as usize;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShortStringError {
    #[error("Encoded string is {0} bytes, limit is 65535")]
    TooLong(usize),

    #[error("Malformed modified UTF-8 at byte {0}")]
    Malformed(usize),

    #[error("Unpaired surrogate in modified UTF-8")]
    UnpairedSurrogate,
}

/// Encode `s` as modified UTF-8 (no length prefix).
pub fn encode(s: &str) -> Result<Vec<u8>, ShortStringError> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007f => out.push(unit as u8),
            0x0000..=0x07ff => {
                out.push(0xc0 | ((unit >> 6) & 0x1f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | ((unit >> 12) & 0x0f) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    if out.len() > MAX_SHORT_STRING_LEN {
        return Err(ShortStringError::TooLong(out.len()));
    }
    Ok(out)
}

/// Decode modified UTF-8 (no length prefix).
pub fn decode(bytes: &[u8]) -> Result<String, ShortStringError> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i] as u16;
        match b0 >> 4 {
            0x0..=0x7 => {
                units.push(b0);
                i += 1;
            }
            0xc | 0xd => {
                let b1 = continuation(bytes, i, 1)?;
                units.push(((b0 & 0x1f) << 6) | b1);
                i += 2;
            }
            0xe => {
                let b1 = continuation(bytes, i, 1)?;
                let b2 = continuation(bytes, i, 2)?;
                units.push(((b0 & 0x0f) << 12) | (b1 << 6) | b2);
                i += 3;
            }
            _ => return Err(ShortStringError::Malformed(i)),
        }
    }
    String::from_utf16(&units).map_err(|_| ShortStringError::UnpairedSurrogate)
}

fn continuation(bytes: &[u8], start: usize, offset: usize) -> Result<u16, ShortStringError> {
    match bytes.get(start + offset) {
        Some(&b) if b & 0xc0 == 0x80 => Ok((b & 0x3f) as u16),
        _ => Err(ShortStringError::Malformed(start)),
    }
}

/// Write `s` with its u16 length prefix.
///
/// Strings longer than the limit fail with `InvalidInput` carrying
/// [`ShortStringError::TooLong`].
pub fn write_short_string<W: Write>(writer: &mut W, s: &str) -> io::Result<()> {
    let encoded = encode(s).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    writer.write_all(&(encoded.len() as u16).to_be_bytes())?;
    writer.write_all(&encoded)
}

/// Read a u16-prefixed string.
///
/// Malformed bytes fail with `InvalidData` carrying a [`ShortStringError`].
pub fn read_short_string<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut len = [0u8; 2];
    reader.read_exact(&mut len)?;
    let mut bytes = vec![0u8; u16::from_be_bytes(len) as usize];
    reader.read_exact(&mut bytes)?;
    decode(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
