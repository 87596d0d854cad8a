//! Error types for folo-replay.
//!
//! Job-level failures are folded into a boolean batch outcome by the executor,
//! but each one still carries enough context (path, URL) to be logged.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for replay and migration runs.
#[derive(Debug, Error)]
pub enum ReplayError {
    // Transport errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("{method} {url} returned status {status}")]
    HttpStatus {
        method: String,
        url: String,
        status: u16,
    },

    #[error("{url} timed out after {after:?}")]
    Timeout {
        url: String,
        after: std::time::Duration,
    },

    // Integrity errors
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("No checksum recorded for {path}")]
    MissingChecksum { path: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Remapping errors
    #[error("Remapping failed: {message}")]
    Remap { message: String },

    #[error("Invalid URL {url:?}: {message}")]
    InvalidUrl { url: String, message: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Run-level errors
    #[error("Provisioning failed: {message}")]
    Provision { message: String },

    #[error("{phase} batch failed: {failed} of {total} jobs did not complete")]
    BatchFailed {
        phase: String,
        failed: usize,
        total: usize,
    },

    #[error("Sealing folo record {build_id} failed: {message}")]
    Seal { build_id: String, message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for replay operations.
pub type Result<T> = std::result::Result<T, ReplayError>;

/// Coarse classification of a failure, used when logging job outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Integrity,
    LocalIo,
    Remapping,
    Finalize,
    Run,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Integrity => "integrity",
            ErrorKind::LocalIo => "local-io",
            ErrorKind::Remapping => "remapping",
            ErrorKind::Finalize => "finalize",
            ErrorKind::Run => "run",
        };
        f.write_str(s)
    }
}

impl From<std::io::Error> for ReplayError {
    fn from(err: std::io::Error) -> Self {
        ReplayError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ReplayError {
    fn from(err: serde_json::Error) -> Self {
        ReplayError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl ReplayError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ReplayError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Classify the error for diagnostics.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReplayError::Network { .. }
            | ReplayError::HttpStatus { .. }
            | ReplayError::Timeout { .. } => ErrorKind::Transport,

            ReplayError::ChecksumMismatch { .. } | ReplayError::MissingChecksum { .. } => {
                ErrorKind::Integrity
            }

            ReplayError::Io { .. } => ErrorKind::LocalIo,

            ReplayError::Remap { .. } | ReplayError::InvalidUrl { .. } => ErrorKind::Remapping,

            ReplayError::Seal { .. } => ErrorKind::Finalize,

            ReplayError::Json { .. }
            | ReplayError::Config { .. }
            | ReplayError::Provision { .. }
            | ReplayError::BatchFailed { .. }
            | ReplayError::Other(_) => ErrorKind::Run,
        }
    }

    /// Whether this error must abort the whole run.
    ///
    /// Seal failures only downgrade to a warning; everything surfacing at run
    /// level otherwise ends the invocation.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ReplayError::Seal { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReplayError::ChecksumMismatch {
            path: "org/x/1.0/x-1.0.jar".into(),
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert_eq!(
            err.to_string(),
            "Checksum mismatch for org/x/1.0/x-1.0.jar: expected aa, got bb"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ReplayError::HttpStatus {
                method: "GET".into(),
                url: "http://indy/x".into(),
                status: 500,
            }
            .kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            ReplayError::MissingChecksum { path: "a".into() }.kind(),
            ErrorKind::Integrity
        );
        assert_eq!(
            ReplayError::io_with_path(
                std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
                "/tmp/download"
            )
            .kind(),
            ErrorKind::LocalIo
        );
        assert_eq!(ErrorKind::LocalIo.to_string(), "local-io");
    }

    #[test]
    fn test_seal_is_not_fatal() {
        let seal = ReplayError::Seal {
            build_id: "build-1".into(),
            message: "503".into(),
        };
        assert!(!seal.is_fatal());
        assert!(ReplayError::BatchFailed {
            phase: "download".into(),
            failed: 1,
            total: 3,
        }
        .is_fatal());
    }
}
