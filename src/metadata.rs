//! Document metadata and the save-history codec.
//!
//! Serialized layout (inside the compressed payload, before the text):
//!
//! ```text
//! [count: u32 BE] then count x [timestamp_millis: i64 BE][username: short string]
//! ```
//!
//! The key and filename are never serialized. The key comes from password
//! verification on open (or the caller before a save) and the filename from the
//! path the document was opened from.

use crate::encryption::{derive_key, DocumentKey};
use crate::short_string::{read_short_string, write_short_string};
use chrono::Utc;
use std::io::{self, Read, Write};
use std::path::PathBuf;

/// Preallocation cap when reading a record count from an untrusted stream
const MAX_PREALLOCATED_RECORDS: usize = 1024;

/// One entry of the save history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRecord {
    pub timestamp_millis: i64,
    pub username: String,
}

impl SaveRecord {
    pub fn new(timestamp_millis: i64, username: impl Into<String>) -> Self {
        Self {
            timestamp_millis,
            username: username.into(),
        }
    }
}

/// Who is saving, and when
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveStamp {
    pub username: String,
    pub timestamp_millis: i64,
}

impl SaveStamp {
    pub fn new(username: impl Into<String>, timestamp_millis: i64) -> Self {
        Self {
            username: username.into(),
            timestamp_millis,
        }
    }

    /// The login name from `USER` (or `USERNAME`) and the current wall-clock time
    pub fn current() -> Self {
        let username = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        Self::new(username, Utc::now().timestamp_millis())
    }
}

/// Bookkeeping attached to a document
#[derive(Debug, Default)]
pub struct DocumentMetadata {
    /// Derived key; set by a successful open or by the caller before a save
    pub key: Option<DocumentKey>,
    /// Chronological save history, most recent last
    pub save_history: Vec<SaveRecord>,
    /// Absolute path the document was opened from
    pub filename: Option<PathBuf>,
}

impl DocumentMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive and store the key for `password`
    pub fn set_password(&mut self, password: &str) {
        self.key = Some(derive_key(password));
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Most recent save, if any
    pub fn last_save(&self) -> Option<&SaveRecord> {
        self.save_history.last()
    }
}

/// Apply a save by `stamp` to `history`.
///
/// If the last record belongs to the same user (compared case-insensitively) its
/// timestamp is refreshed in place; otherwise a new record is appended.
pub fn record_save(mut history: Vec<SaveRecord>, stamp: &SaveStamp) -> Vec<SaveRecord> {
    match history.last_mut() {
        Some(last) if same_user(&last.username, &stamp.username) => {
            last.timestamp_millis = stamp.timestamp_millis;
            return history;
        }
        _ => {}
    }
    history.push(SaveRecord::new(stamp.timestamp_millis, stamp.username.clone()));
    history
}

fn same_user(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Serialize the save history.
pub fn write_history<W: Write>(writer: &mut W, history: &[SaveRecord]) -> io::Result<()> {
    let count = u32::try_from(history.len()).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "save history has too many records")
    })?;
    writer.write_all(&count.to_be_bytes())?;
    for record in history {
        writer.write_all(&record.timestamp_millis.to_be_bytes())?;
        write_short_string(writer, &record.username)?;
    }
    Ok(())
}

/// Deserialize the save history.
pub fn read_history<R: Read>(reader: &mut R) -> io::Result<Vec<SaveRecord>> {
    let mut count = [0u8; 4];
    reader.read_exact(&mut count)?;
    let count = u32::from_be_bytes(count) as usize;

    let mut history = Vec::with_capacity(count.min(MAX_PREALLOCATED_RECORDS));
    for _ in 0..count {
        let mut timestamp = [0u8; 8];
        reader.read_exact(&mut timestamp)?;
        let username = read_short_string(reader)?;
        history.push(SaveRecord::new(i64::from_be_bytes(timestamp), username));
    }
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_save_appends() {
        let history = record_save(Vec::new(), &SaveStamp::new("alice", 1000));
        assert_eq!(history, vec![SaveRecord::new(1000, "alice")]);
    }

    #[test]
    fn test_same_user_updates_in_place() {
        let history = record_save(Vec::new(), &SaveStamp::new("alice", 1000));
        let history = record_save(history, &SaveStamp::new("alice", 2000));

        assert_eq!(history, vec![SaveRecord::new(2000, "alice")]);
    }

    #[test]
    fn test_same_user_ignores_case() {
        let history = vec![SaveRecord::new(1000, "Alice")];
        let history = record_save(history, &SaveStamp::new("alice", 2000));

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].timestamp_millis, 2000);
        assert_eq!(history[0].username, "Alice");
    }

    #[test]
    fn test_different_user_appends() {
        let history = record_save(Vec::new(), &SaveStamp::new("alice", 1000));
        let history = record_save(history, &SaveStamp::new("bob", 2000));
        let history = record_save(history, &SaveStamp::new("alice", 3000));

        assert_eq!(
            history,
            vec![
                SaveRecord::new(1000, "alice"),
                SaveRecord::new(2000, "bob"),
                SaveRecord::new(3000, "alice"),
            ]
        );
    }

    #[test]
    fn test_only_last_record_considered() {
        let history = vec![SaveRecord::new(1, "alice"), SaveRecord::new(2, "bob")];
        let history = record_save(history, &SaveStamp::new("alice", 3));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_history_codec_roundtrip() {
        let history = vec![
            SaveRecord::new(1_234_567_890_123, "alice"),
            SaveRecord::new(-5, "bøb"),
            SaveRecord::new(i64::MAX, ""),
        ];

        let mut buf = Vec::new();
        write_history(&mut buf, &history).unwrap();
        let decoded = read_history(&mut buf.as_slice()).unwrap();

        assert_eq!(decoded, history);
    }

    #[test]
    fn test_history_byte_layout() {
        let mut buf = Vec::new();
        write_history(&mut buf, &[SaveRecord::new(0x0102, "ab")]).unwrap();

        assert_eq!(
            buf,
            vec![
                0, 0, 0, 1, // count
                0, 0, 0, 0, 0, 0, 0x01, 0x02, // timestamp
                0, 2, b'a', b'b', // username
            ]
        );
    }

    #[test]
    fn test_empty_history() {
        let mut buf = Vec::new();
        write_history(&mut buf, &[]).unwrap();
        assert_eq!(buf, vec![0, 0, 0, 0]);
        assert!(read_history(&mut buf.as_slice()).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_history() {
        // Claims 3 records, carries none
        let buf = [0u8, 0, 0, 3];
        let err = read_history(&mut &buf[..]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_metadata_password() {
        let mut metadata = DocumentMetadata::new();
        assert!(!metadata.has_key());

        metadata.set_password("pw");
        assert!(metadata.has_key());
        assert_eq!(metadata.key.as_ref(), Some(&derive_key("pw")));
    }

    #[test]
    fn test_current_stamp() {
        let stamp = SaveStamp::current();
        assert!(!stamp.username.is_empty());
        assert!(stamp.timestamp_millis > 0);
    }
}
