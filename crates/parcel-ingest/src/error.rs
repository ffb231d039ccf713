//! Error types for the loader
//!
//! Only [`StoreError::Rejected`] raised by a row insert is recovered
//! locally. Every [`IngestError`] is fatal to the run and carries the exit
//! status the binary reports.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

/// Missing or malformed command-line input
pub const EXIT_USAGE: i32 = 1;

/// The data root has no directory for the requested state
pub const EXIT_UNKNOWN_STATE: i32 = 2;

/// Anything that went wrong after the job was accepted
pub const EXIT_LOAD_FAILED: i32 = 3;

/// Result type alias for loader operations
pub type IngestResult<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid state code '{0}': expected two ASCII letters or digits")]
    InvalidStateCode(String),

    #[error("No input data for state {state}: {} is not a directory", path.display())]
    UnknownState { state: String, path: PathBuf },

    #[error("Unknown dataset '{0}'")]
    UnknownDataset(String),

    #[error("Invalid SQL identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit status for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            IngestError::InvalidStateCode(_)
            | IngestError::UnknownDataset(_)
            | IngestError::Config(_) => EXIT_USAGE,
            IngestError::UnknownState { .. } => EXIT_UNKNOWN_STATE,
            _ => EXIT_LOAD_FAILED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let usage = IngestError::InvalidStateCode("x".into()).exit_code();
        let unknown = IngestError::UnknownState {
            state: "99".into(),
            path: PathBuf::from("/data/99"),
        }
        .exit_code();
        let failed = IngestError::InvalidIdentifier("Main".into()).exit_code();

        assert_eq!(usage, EXIT_USAGE);
        assert_eq!(unknown, EXIT_UNKNOWN_STATE);
        assert_eq!(failed, EXIT_LOAD_FAILED);
        assert_ne!(usage, unknown);
        assert_ne!(unknown, failed);
    }

    #[test]
    fn test_config_error_is_usage() {
        assert_eq!(IngestError::Config("bad".into()).exit_code(), EXIT_USAGE);
    }

    #[test]
    fn test_store_errors_are_fatal() {
        let err: IngestError = StoreError::NoTransaction.into();
        assert_eq!(err.exit_code(), EXIT_LOAD_FAILED);
    }

    #[test]
    fn test_io_error_names_path() {
        let err = IngestError::io(
            "/data/06/ZAsmt/Main.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("/data/06/ZAsmt/Main.txt"));
    }
}
