// ABOUTME: Capability interface over programs that host named terminal sessions
// Adapters hide process invocation and output parsing; the service only sees this trait

pub mod error;
pub mod registry;

pub use error::MultiplexerError;
pub use registry::AdapterRegistry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;

/// Live state of one session as observed by an adapter.
///
/// Produced fresh on every query and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiplexerSession {
    /// User-facing name with the namespace prefix stripped
    pub name: String,
    /// Namespaced identity inside the multiplexer
    handle: String,
    pub running: bool,
    pub attached: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub pane_count: usize,
}

impl MultiplexerSession {
    pub fn new(name: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: handle.into(),
            running: true,
            attached: false,
            created_at: None,
            pane_count: 0,
        }
    }

    #[must_use]
    pub fn with_attached(mut self, attached: bool) -> Self {
        self.attached = attached;
        self
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }

    /// The identity the multiplexer itself knows this session by.
    pub fn handle(&self) -> &str {
        &self.handle
    }
}

/// Operations every multiplexer backend provides.
///
/// All names passed in and returned are user-facing; implementations apply and
/// strip their own namespace. `attach_to_session` is the exception to the
/// otherwise bounded-time contract: it takes over the controlling terminal and
/// does not return until the user detaches or the session exits.
#[async_trait]
pub trait Multiplexer: Send + Sync {
    /// Backend identifier recorded on every session it owns, e.g. `"tmux"`
    fn get_name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// Namespaced identity for a user-facing name
    fn session_handle(&self, name: &str) -> String;

    async fn create_session(
        &self,
        name: &str,
        working_dir: &Path,
        command: &str,
    ) -> Result<MultiplexerSession, MultiplexerError>;

    async fn get_session(&self, name: &str) -> Result<MultiplexerSession, MultiplexerError>;

    /// Only sessions inside this adapter's namespace. An absent server is an empty list.
    async fn list_sessions(&self) -> Result<Vec<MultiplexerSession>, MultiplexerError>;

    /// Blocking and interactive: stdio is handed to the multiplexer until detach.
    async fn attach_to_session(&self, name: &str) -> Result<(), MultiplexerError>;

    async fn kill_session(&self, name: &str) -> Result<(), MultiplexerError>;

    /// Attempts every session and reports all failures together.
    async fn kill_all_sessions(&self) -> Result<(), MultiplexerError>;

    async fn is_session_running(&self, name: &str) -> bool;

    async fn has_session(&self, name: &str) -> Result<bool, MultiplexerError>;

    /// Zero when the session does not exist.
    async fn get_session_pane_count(&self, name: &str) -> Result<usize, MultiplexerError>;

    /// Pane counts for every session in the namespace from a single query.
    ///
    /// Sessions without panes, or an absent server, are simply missing from the map.
    async fn list_pane_counts(&self) -> Result<HashMap<String, usize>, MultiplexerError>;
}
