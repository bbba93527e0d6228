//! Error types for LeadEnrich.
//!
//! Library crates use [`LeadEnrichError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all LeadEnrich operations.
#[derive(Debug, thiserror::Error)]
pub enum LeadEnrichError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport failure, non-2xx response, or malformed API payload.
    #[error("API error: {0}")]
    Network(String),

    /// The remote index has no business matching the query.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Response or document parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// CSV reading or writing error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Missing identifying fields on a row, or required columns missing from a table.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Text-generation call failed.
    #[error("LLM error: {0}")]
    Generation(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LeadEnrichError>;

impl LeadEnrichError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a not-found error from any displayable message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the remote index simply has no match (expected, not a fault).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
