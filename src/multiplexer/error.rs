// ABOUTME: Error types for multiplexer adapters
// Defines the failure modes a caller must be able to tell apart when driving a multiplexer

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MultiplexerError {
    #[error("{0} is not installed or could not be found")]
    NotInstalled(String),

    #[error("Unknown multiplexer backend: {0}")]
    UnknownBackend(String),

    #[error("Session already exists: {0}")]
    SessionExists(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Attach to {0} exited with an error")]
    AttachFailed(String),

    #[error("Failed to kill {} of {attempted} sessions: {}", .failures.len(), describe_failures(.failures))]
    Aggregate {
        failures: Vec<(String, MultiplexerError)>,
        attempted: usize,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MultiplexerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, MultiplexerError::SessionNotFound(_))
    }
}

pub(crate) fn describe_failures<E: std::fmt::Display>(failures: &[(String, E)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("{name} ({err})"))
        .collect::<Vec<_>>()
        .join("; ")
}
