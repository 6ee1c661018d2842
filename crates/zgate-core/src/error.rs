//! Error types for zgate.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZgateError {
    #[error("Invalid save label '{label}': {reason}")]
    InvalidLabel { label: String, reason: &'static str },

    #[error("Invalid identity '{0}'")]
    InvalidIdentity(String),

    #[error("Interpreter never showed the {marker} within {timeout:?}")]
    ProtocolTimeout { marker: &'static str, timeout: Duration },

    #[error("Interpreter closed its output while waiting for the {marker}")]
    UnexpectedEof { marker: &'static str },

    #[error("Interpreter asked to overwrite {0:?}, which was not expected to exist")]
    UnexpectedOverwrite(PathBuf),

    #[error("Invalid session state: expected {expected}, got {actual}")]
    InvalidSessionState { expected: String, actual: String },

    #[error("Process spawn failed: {0}")]
    ProcessSpawnFailed(String),

    #[error("PTY error: {0}")]
    PtyError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ZgateError {
    /// True for failures of the interpreter conversation itself.
    pub fn is_protocol_failure(&self) -> bool {
        matches!(
            self,
            ZgateError::ProtocolTimeout { .. }
                | ZgateError::UnexpectedEof { .. }
                | ZgateError::UnexpectedOverwrite(_)
        )
    }
}
