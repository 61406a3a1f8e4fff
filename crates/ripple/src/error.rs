//! Error types for Ripple operations.
//!
//! Errors fall into two groups:
//!
//! - **`Error`**: Top-level errors returned to the caller (missing graph, storage failures)
//! - **`ExtractionError`**: File-level diagnostics collected during extraction, never raised
//!
//! ## Error Philosophy
//!
//! Analysis is best effort:
//! - A single unparsable file degrades to an empty fact sheet
//! - Ambiguous resolution is not an error, it produces lower-confidence edges
//! - Only caller mistakes and infrastructure failures surface as `Error`
//!
//! ## Error Categorization
//!
//! `ExtractionErrorKind` uses a 4xx/5xx style categorization:
//! - Input problems (source file's fault): syntax errors, unsupported languages
//! - Internal problems (our fault): grammar loading, parser failures

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Ripple operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for Ripple operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Impact computation was requested before any graph was built
    #[error("impact computation requires a graph; call build_graph first")]
    MissingGraph,

    /// A non-empty change set matched no node in the graph
    #[error("no changed files resolved to any code: {}", paths.join(", "))]
    NoChangesResolved {
        /// The changed paths that failed to map
        paths: Vec<String>,
    },

    /// A repository id or snapshot key entry cannot be rendered unambiguously
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// File system operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot store operation failed
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Snapshot or document (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Snapshot content is inconsistent (unknown node, mismatched id)
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Internal invariant violated (lock poisoning and similar)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Diagnostic recorded while extracting facts from one file.
///
/// These are collected alongside the fact sheet and never abort extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionError {
    /// Path to the file that produced the diagnostic
    pub path: PathBuf,
    /// Category of the diagnostic
    pub kind: ExtractionErrorKind,
    /// Human-readable message
    pub message: String,
}

impl std::fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.path.display(),
            self.message,
            self.kind
        )
    }
}

impl std::error::Error for ExtractionError {}

/// Categorization of extraction diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionErrorKind {
    // === Input Problems (analogous to HTTP 4xx) ===
    /// File type has no grammar (unknown extension)
    UnsupportedLanguage,

    /// Content was not valid UTF-8 and was decoded lossily
    EncodingError,

    /// Tree contains error nodes; facts outside them were still extracted
    SyntaxErrors,

    // === Internal Problems (analogous to HTTP 5xx) ===
    /// Parser could not be configured or produced no tree
    ParseFailed,
}

impl std::fmt::Display for ExtractionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLanguage => write!(f, "unsupported language"),
            Self::EncodingError => write!(f, "encoding error"),
            Self::SyntaxErrors => write!(f, "syntax errors"),
            Self::ParseFailed => write!(f, "parse failed"),
        }
    }
}

impl ExtractionErrorKind {
    /// Returns `true` if this is an input problem (4xx-style).
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedLanguage | Self::EncodingError | Self::SyntaxErrors
        )
    }

    /// Returns `true` if this is an internal problem (5xx-style).
    #[must_use]
    pub fn is_internal_error(&self) -> bool {
        matches!(self, Self::ParseFailed)
    }
}

impl ExtractionError {
    /// Create a new extraction diagnostic.
    #[must_use]
    pub fn new(path: PathBuf, kind: ExtractionErrorKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }

    /// Create an unsupported language diagnostic.
    #[must_use]
    pub fn unsupported_language(path: PathBuf) -> Self {
        let ext = path
            .extension()
            .map_or_else(|| "none".to_string(), |e| e.to_string_lossy().to_string());
        Self::new(
            path,
            ExtractionErrorKind::UnsupportedLanguage,
            format!("unsupported extension: {ext}"),
        )
    }

    /// Create an encoding diagnostic for a file decoded lossily.
    #[must_use]
    pub fn encoding_error(path: PathBuf) -> Self {
        Self::new(
            path,
            ExtractionErrorKind::EncodingError,
            "file is not valid UTF-8; invalid sequences were replaced",
        )
    }

    /// Create a syntax error diagnostic.
    #[must_use]
    pub fn syntax_errors(path: PathBuf) -> Self {
        Self::new(
            path,
            ExtractionErrorKind::SyntaxErrors,
            "syntax tree contains errors; extracted partial facts",
        )
    }

    /// Create a parse failure diagnostic.
    #[must_use]
    pub fn parse_failed(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(path, ExtractionErrorKind::ParseFailed, message)
    }
}
