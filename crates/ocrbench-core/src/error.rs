//! Error types for loading assertion suites and scoring candidates.
//!
//! Failures that only affect one repeat of one assertion never surface here:
//! the evaluator folds them into that assertion's pass ratio. [`BenchError`]
//! covers the structural problems that make a run meaningless.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a benchmark or producing its artifacts.
#[derive(Error, Debug)]
pub enum BenchError {
    /// File I/O error with the path that caused it.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An assertion parsed but cannot be evaluated (e.g. empty match text).
    #[error("Invalid assertion {id}: {reason}")]
    InvalidAssertion { id: String, reason: String },

    /// Two assertions share an id.
    #[error("Duplicate assertion id {id} (in {first} and {second})")]
    DuplicateId {
        id: String,
        first: String,
        second: String,
    },

    /// A source PDF could not be opened to count its pages.
    #[error("Failed to read PDF {path}: {reason}")]
    Pdf { path: PathBuf, reason: String },

    /// Missing inputs or inconsistent settings.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BenchError {
    /// Wrap an [`std::io::Error`] with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for benchmark operations.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Errors raised by a matching function for a single assertion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// The assertion is not evaluable (empty text, bad window, ...).
    #[error("invalid assertion: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mentions_path() {
        let err = BenchError::io(
            "/tmp/missing.jsonl",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/missing.jsonl"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn test_duplicate_id_display() {
        let err = BenchError::DuplicateId {
            id: "t1".to_string(),
            first: "a.jsonl".to_string(),
            second: "b.jsonl".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Duplicate assertion id t1 (in a.jsonl and b.jsonl)"
        );
    }
}
