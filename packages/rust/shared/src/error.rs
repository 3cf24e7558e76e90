//! Error types for Grounder.
//!
//! Library crates use [`GrounderError`] via `thiserror`.
//! App crates (cli) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Grounder operations.
#[derive(Debug, thiserror::Error)]
pub enum GrounderError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A single page fetch failed. Absorbed by the pipeline; only escalates
    /// when every candidate page fails.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Every candidate page fetch failed, so there is nothing to ground on.
    #[error("no context available: {0}")]
    NoContext(String),

    /// The embedding service returned a non-success response.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The text-generation service returned a non-success response.
    #[error("generation error: {0}")]
    Generation(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GrounderError>;

impl GrounderError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
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

    /// Machine-readable name of the failing pipeline stage.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Fetch(_) => "fetch",
            Self::NoContext(_) => "fetch-all-failed",
            Self::Embedding(_) => "embedding-failed",
            Self::Generation(_) => "generation-failed",
            Self::Io { .. } => "io",
        }
    }
}
