//! Common test utilities and fixtures for the sealdoc-core test suite.
//!
//! Shared passwords, texts and a builder for document files of every format
//! version (including the read-only legacy ones), so integration and property
//! tests agree on the same inputs.

pub mod fixtures;
