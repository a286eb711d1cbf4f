// ABOUTME: Error taxonomy for session storage and lifecycle operations
// Every variant carries the identifier involved so callers can act on it

use crate::models::Session;
use crate::multiplexer::error::describe_failures;
use crate::multiplexer::MultiplexerError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid session name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Multiplexer backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Session {0} is not running")]
    NotRunning(String),

    /// The record was persisted but the live session never started
    #[error("Session {} was saved but failed to start: {source}", .session.name)]
    PartialFailure {
        session: Box<Session>,
        #[source]
        source: MultiplexerError,
    },

    #[error("Corrupt session record {}: {source}", .path.display())]
    CorruptRecord {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to delete {} of {attempted} sessions: {}", .failures.len(), describe_failures(.failures))]
    Aggregate {
        failures: Vec<(String, SessionError)>,
        attempted: usize,
    },

    #[error(transparent)]
    Multiplexer(MultiplexerError),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize session data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Session index lock poisoned")]
    LockPoisoned,
}

impl SessionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SessionError::Io {
            path: path.into(),
            source,
        }
    }

    /// No record or no live session exists for the identifier
    pub fn is_not_found(&self) -> bool {
        match self {
            SessionError::NotFound(_) => true,
            SessionError::Multiplexer(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// The multiplexer binary is missing, either directly or behind a partial create
    pub fn is_backend_unavailable(&self) -> bool {
        match self {
            SessionError::BackendUnavailable(_) => true,
            SessionError::PartialFailure { source, .. } => {
                matches!(source, MultiplexerError::NotInstalled(_))
            }
            _ => false,
        }
    }

    /// The still-usable record carried by a partial create
    pub fn partial_session(&self) -> Option<&Session> {
        match self {
            SessionError::PartialFailure { session, .. } => Some(session.as_ref()),
            _ => None,
        }
    }
}

impl From<MultiplexerError> for SessionError {
    fn from(err: MultiplexerError) -> Self {
        match err {
            MultiplexerError::NotInstalled(backend) | MultiplexerError::UnknownBackend(backend) => {
                SessionError::BackendUnavailable(backend)
            }
            other => SessionError::Multiplexer(other),
        }
    }
}
