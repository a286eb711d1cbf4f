// ABOUTME: Session data model representing a persisted, named multiplexer session
// The status field is a snapshot; the service recomputes it from live state on every read

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Effective status of a session, derived from live multiplexer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Running, no client attached
    Active,
    /// No live session in the multiplexer
    Inactive,
    /// Running with at least one attached client
    Connected,
    /// Never reached a running state
    Error,
}

impl SessionStatus {
    pub fn indicator(&self) -> &'static str {
        match self {
            SessionStatus::Active => "●",
            SessionStatus::Connected => "◉",
            SessionStatus::Inactive => "⏸",
            SessionStatus::Error => "✗",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, SessionStatus::Active | SessionStatus::Connected)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionStatus::Active => "active",
            SessionStatus::Inactive => "inactive",
            SessionStatus::Connected => "connected",
            SessionStatus::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    #[serde(default)]
    pub project_path: String,
    #[serde(default)]
    pub description: String,
    pub backend: String,
    /// Recomputed on every list/reconcile, never stored
    #[serde(skip)]
    pub pane_count: usize,
}

impl Session {
    pub fn new(name: String, description: String, project_path: String, backend: String) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            name,
            status: SessionStatus::Inactive,
            created_at: now,
            last_active: now,
            project_path,
            description,
            backend,
            pane_count: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    pub fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
        self.touch();
    }
}
