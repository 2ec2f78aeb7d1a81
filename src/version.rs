//! Format versioning
//!
//! A file carries two version bytes. The major `versionFormat` byte is bumped for
//! incompatible framing changes and is currently always [`FORMAT_VERSION`]. The
//! `versionMinor` byte selects the password check and text encoding:
//!
//! | Minor | Password check | Text encoding |
//! |-------|----------------|---------------|
//! | 0 | `key[17..19]` (legacy, IV-independent) | u16-prefixed short string |
//! | 1 | `SHA-1(key ‖ iv)[0..2]` | u16-prefixed short string |
//! | 2 | `SHA-1(key ‖ iv)[0..2]` | u32-prefixed UTF-8 |
//!
//! The minor byte is decoded once into [`FormatVersion`] when a file is opened; all
//! version-specific behaviour is selected by matching on that enum. New files are
//! always written as [`FormatVersion::CURRENT`].

use crate::error::FormatError;
use std::fmt;

/// Highest major format version this crate reads and the one it writes
pub const FORMAT_VERSION: u8 = 1;

/// Closed set of readable minor versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormatVersion {
    /// Legacy files. The password check is a slice of the key itself and does not
    /// depend on the IV, so a stored check is a fixed function of the password.
    /// Readable for compatibility; never written.
    V0,
    /// IV-bound password check, short-string text
    V1,
    /// IV-bound password check, length-prefixed text of any size
    V2,
}

/// How the password check in the header is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckAlgorithm {
    /// Two bytes of the derived key (v0 only)
    LegacyKeySlice,
    /// First two bytes of `SHA-1(key ‖ iv)`
    KeyIvDigest,
}

/// How the document text is framed inside the compressed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// u16 length + modified UTF-8, limited to 65535 encoded bytes
    ShortString,
    /// u32 length + UTF-8
    LengthPrefixed,
}

impl FormatVersion {
    /// Version written by [`crate::DocumentFormat::save`]
    pub const CURRENT: Self = FormatVersion::V2;

    /// Highest minor version this build understands
    pub const MAX_MINOR: u8 = 2;

    /// Decode a minor version byte
    pub fn from_minor(minor: u8) -> Result<Self, FormatError> {
        match minor {
            0 => Ok(FormatVersion::V0),
            1 => Ok(FormatVersion::V1),
            2 => Ok(FormatVersion::V2),
            other => Err(FormatError::UnsupportedMinorVersion(other)),
        }
    }

    /// The on-disk minor version byte
    pub fn minor(self) -> u8 {
        match self {
            FormatVersion::V0 => 0,
            FormatVersion::V1 => 1,
            FormatVersion::V2 => 2,
        }
    }

    pub fn check_algorithm(self) -> CheckAlgorithm {
        match self {
            FormatVersion::V0 => CheckAlgorithm::LegacyKeySlice,
            FormatVersion::V1 | FormatVersion::V2 => CheckAlgorithm::KeyIvDigest,
        }
    }

    pub fn text_encoding(self) -> TextEncoding {
        match self {
            FormatVersion::V0 | FormatVersion::V1 => TextEncoding::ShortString,
            FormatVersion::V2 => TextEncoding::LengthPrefixed,
        }
    }
}

impl Default for FormatVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", FORMAT_VERSION, self.minor())
    }
}

impl TryFrom<u8> for FormatVersion {
    type Error = FormatError;

    fn try_from(minor: u8) -> Result<Self, Self::Error> {
        Self::from_minor(minor)
    }
}

impl From<FormatVersion> for u8 {
    fn from(version: FormatVersion) -> Self {
        version.minor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_roundtrip() {
        for minor in 0..=FormatVersion::MAX_MINOR {
            let version = FormatVersion::from_minor(minor).unwrap();
            assert_eq!(version.minor(), minor);
            assert_eq!(u8::from(version), minor);
        }
    }

    #[test]
    fn test_unknown_minor_rejected() {
        assert!(matches!(
            FormatVersion::try_from(3),
            Err(FormatError::UnsupportedMinorVersion(3))
        ));
        assert!(matches!(
            FormatVersion::from_minor(0xff),
            Err(FormatError::UnsupportedMinorVersion(0xff))
        ));
    }

    #[test]
    fn test_current_is_latest() {
        assert_eq!(FormatVersion::CURRENT.minor(), FormatVersion::MAX_MINOR);
        assert_eq!(FormatVersion::default(), FormatVersion::V2);
    }

    #[test]
    fn test_version_features() {
        assert_eq!(
            FormatVersion::V0.check_algorithm(),
            CheckAlgorithm::LegacyKeySlice
        );
        assert_eq!(FormatVersion::V1.check_algorithm(), CheckAlgorithm::KeyIvDigest);
        assert_eq!(FormatVersion::V2.check_algorithm(), CheckAlgorithm::KeyIvDigest);

        assert_eq!(FormatVersion::V0.text_encoding(), TextEncoding::ShortString);
        assert_eq!(FormatVersion::V1.text_encoding(), TextEncoding::ShortString);
        assert_eq!(FormatVersion::V2.text_encoding(), TextEncoding::LengthPrefixed);
    }

    #[test]
    fn test_display() {
        assert_eq!(FormatVersion::V2.to_string(), "v1.2");
        assert_eq!(FormatVersion::V0.to_string(), "v1.0");
    }
}
