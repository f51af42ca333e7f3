//! Error types for the harness.
//!
//! Every failure is fatal: nothing here is retried or recovered.

use std::io;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors raised while generating, converting, or aggregating.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The external process could not be started at all.
    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The external process ran but exited unsuccessfully.
    #[error("Command `{command}` failed with {status}")]
    CommandFailed { command: String, status: ExitStatus },

    /// An input name from which no stem can be derived.
    #[error("Invalid input name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A link in the master document points at a descriptor that was never produced.
    #[error("Missing KML descriptor: {href}")]
    MissingDescriptor { href: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Directory traversal error
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Result type alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_name_display() {
        let err = HarnessError::InvalidName {
            name: "a.b".to_string(),
            reason: "too short".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid input name \"a.b\": too short");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err: HarnessError = io_err.into();
        assert!(matches!(err, HarnessError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }
}
