//! Error types for indexing and workspace operations.
//!
//! An unresolved symbol is not an error: lookups return `None` or an empty
//! declaration set. Everything here is recoverable and scoped to one file.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tower_lsp::lsp_types::{Range, Url};

/// Source language of a parsed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SourceLanguage {
    Yaml,
    Php,
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLanguage::Yaml => write!(f, "YAML"),
            SourceLanguage::Php => write!(f, "PHP"),
        }
    }
}

/// A file's text could not be parsed well enough to extract symbols.
///
/// The failure is local: other files are unaffected and the index keeps the
/// entries of the last successfully extracted version of this file.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{language} parse failure at {}: {message}", one_based(.range))]
pub struct ParseFailure {
    pub language: SourceLanguage,
    /// Location of the first syntax error, or the whole file when unknown.
    pub range: Range,
    pub message: String,
}

impl ParseFailure {
    pub fn new(language: SourceLanguage, range: Range, message: impl Into<String>) -> Self {
        Self {
            language,
            range,
            message: message.into(),
        }
    }
}

fn one_based(range: &Range) -> String {
    format!("{}:{}", range.start.line + 1, range.start.character + 1)
}

/// Errors raised while maintaining the symbol index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// An extraction result arrived after a newer one for the same file.
    #[error("discarded stale extraction for {uri}: revision {incoming} is older than {current}")]
    StaleVersionDiscarded { uri: Url, incoming: u64, current: u64 },

    /// An editor change carried a version not newer than the open document's.
    #[error("ignored change to {uri}: version {incoming} is not newer than {current}")]
    OutdatedVersion { uri: Url, incoming: i32, current: i32 },

    /// A workspace file could not be read.
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The path cannot be expressed as a `file://` URI.
    #[error("invalid file path: {0:?}")]
    InvalidPath(PathBuf),
}

impl IndexError {
    /// Returns true for outcomes that are expected during normal operation.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            IndexError::StaleVersionDiscarded { .. } | IndexError::OutdatedVersion { .. }
        )
    }
}
