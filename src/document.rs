//! The in-memory document: text plus metadata.

use crate::error::Result;
use crate::format::DocumentFormat;
use crate::metadata::{DocumentMetadata, SaveStamp};
use std::io::{Read, Write};
use std::path::Path;

/// A text document with its password key and save history
#[derive(Debug, Default)]
pub struct Document {
    pub(crate) text: String,
    pub(crate) metadata: DocumentMetadata,
}

impl Document {
    /// Empty document with no key
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: DocumentMetadata::default(),
        }
    }

    pub fn from_parts(text: String, metadata: DocumentMetadata) -> Self {
        Self { text, metadata }
    }

    pub fn into_parts(self) -> (String, DocumentMetadata) {
        (self.text, self.metadata)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut DocumentMetadata {
        &mut self.metadata
    }

    /// Derive the key for `password`; required before the first save.
    pub fn set_password(&mut self, password: &str) {
        self.metadata.set_password(password);
    }

    /// Read a document from `source` with the default format options.
    pub fn load<R: Read>(source: R, password: &str, origin: Option<&Path>) -> Result<Self> {
        DocumentFormat::default().open(source, password, origin)
    }

    /// Replace this document with the one read from `source`.
    ///
    /// On failure `self` is left untouched.
    pub fn open<R: Read>(&mut self, source: R, password: &str, origin: Option<&Path>) -> Result<()> {
        *self = Self::load(source, password, origin)?;
        Ok(())
    }

    /// Replace this document with the one stored at `path`.
    pub fn open_file(&mut self, path: impl AsRef<Path>, password: &str) -> Result<()> {
        *self = DocumentFormat::default().open_file(path, password)?;
        Ok(())
    }

    /// Save to `sink` as the current user; updates the save history.
    pub fn save<W: Write>(&mut self, sink: W) -> Result<()> {
        DocumentFormat::default().save(self, sink)
    }

    pub fn save_with_stamp<W: Write>(&mut self, sink: W, stamp: &SaveStamp) -> Result<()> {
        DocumentFormat::default().save_with_stamp(self, sink, stamp)
    }

    pub fn save_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        DocumentFormat::default().save_file(self, path)
    }
}
