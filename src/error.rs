//! Error types for version tracking and live watching.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from registry, tree and watch operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A version spec failed validation at add/update time.
    #[error("version {field} must be a non-empty string (zone '{zone}')")]
    InvalidVersion { zone: String, field: &'static str },

    /// A version's root directory does not exist at walk time.
    #[error("version {no} directory does not exist at {location} (resolved to {path})")]
    MissingRoot {
        no: String,
        location: String,
        path: PathBuf,
    },

    /// The walker failed mid-traversal.
    #[error("failed to walk {path}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// A file event arrived for a path outside every tracked version root.
    #[error("{path} is not part of any tracked version tree")]
    UntrackedPath { path: PathBuf },

    /// A session operation was called before the watcher was started.
    #[error("watcher is not started: call start before {op}")]
    NotStarted { op: &'static str },

    /// A session operation was called after the watcher was closed.
    #[error("watch session is closed")]
    SessionClosed,

    /// The external document parser failed.
    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        source: anyhow::Error,
    },

    /// The consumer's event sink failed.
    #[error("event sink failed: {0}")]
    Sink(anyhow::Error),

    /// The underlying watch backend reported an error.
    #[error("watch backend error: {0}")]
    Backend(String),
}

impl From<notify::Error> for Error {
    fn from(e: notify::Error) -> Self {
        Error::Backend(e.to_string())
    }
}
