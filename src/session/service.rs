// ABOUTME: Session lifecycle and reconciliation between persisted records and live multiplexer state
// The only place that decides a session's effective status

use super::error::SessionError;
use super::repository::{ListReport, SessionRepository};
use crate::models::{Session, SessionStatus};
use crate::multiplexer::{Multiplexer, MultiplexerSession};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Longest accepted session name
pub const MAX_NAME_LEN: usize = 64;

lazy_static! {
    // tmux rewrites '.' and ':' in session names, which would break the name mapping
    static ref VALID_NAME: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
}

pub fn validate_name(name: &str) -> Result<(), SessionError> {
    let reason = if name.is_empty() {
        "name must not be empty"
    } else if name.len() > MAX_NAME_LEN {
        "name must be at most 64 characters"
    } else if !VALID_NAME.is_match(name) {
        "only letters, digits, '-' and '_' are allowed"
    } else {
        return Ok(());
    };

    Err(SessionError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// Overwrites the status and pane count of a record from observed live state.
pub fn reconcile(session: &mut Session, live: Option<&MultiplexerSession>) {
    match live {
        Some(state) if state.running => {
            session.status = if state.attached {
                SessionStatus::Connected
            } else {
                SessionStatus::Active
            };
            session.pane_count = state.pane_count;
        }
        _ => {
            session.status = SessionStatus::Inactive;
            session.pane_count = 0;
        }
    }
}

pub struct SessionService {
    repository: Arc<SessionRepository>,
    multiplexer: Arc<dyn Multiplexer>,
    default_command: String,
}

impl SessionService {
    pub fn new(repository: Arc<SessionRepository>, multiplexer: Arc<dyn Multiplexer>) -> Self {
        Self {
            repository,
            multiplexer,
            default_command: String::new(),
        }
    }

    /// Command started in new sessions; empty means the multiplexer's default shell
    #[must_use]
    pub fn with_default_command(mut self, command: impl Into<String>) -> Self {
        self.default_command = command.into();
        self
    }

    pub fn get_backend_name(&self) -> &str {
        self.multiplexer.get_name()
    }

    pub fn is_backend_available(&self) -> bool {
        self.multiplexer.is_available()
    }

    /// Persists a new record, then starts its live session.
    ///
    /// If the multiplexer fails, the record is kept as `Inactive` and returned
    /// inside [`SessionError::PartialFailure`].
    pub async fn create_session(
        &self,
        name: &str,
        description: &str,
        working_dir: &str,
    ) -> Result<Session, SessionError> {
        validate_name(name)?;

        if self.repository.exists(name) {
            return Err(SessionError::AlreadyExists(name.to_string()));
        }

        let working_dir = resolve_working_dir(working_dir)?;
        let mut session = Session::new(
            name.to_string(),
            description.to_string(),
            working_dir.display().to_string(),
            self.multiplexer.get_name().to_string(),
        );
        session.status = SessionStatus::Active;
        self.repository.save(&session)?;

        match self
            .multiplexer
            .create_session(name, &working_dir, &self.default_command)
            .await
        {
            Ok(live) => {
                session.set_status(SessionStatus::Active);
                session.pane_count = live.pane_count;
                self.repository.save(&session)?;
                self.repository.save_index()?;

                info!("Created session {} ({}) in {}", session.name, session.id, session.project_path);
                Ok(session)
            }
            Err(source) => {
                warn!("Session {} saved but failed to start: {}", name, source);
                session.set_status(SessionStatus::Inactive);

                if let Err(e) = self.repository.save(&session) {
                    warn!("Failed to record inactive status for {}: {}", name, e);
                }
                if let Err(e) = self.repository.save_index() {
                    warn!("Failed to flush name index after creating {}: {}", name, e);
                }

                Err(SessionError::PartialFailure {
                    session: Box::new(session),
                    source,
                })
            }
        }
    }

    /// Looks a session up by id or name and reconciles it with live state.
    pub async fn get_session(&self, identifier: &str) -> Result<Session, SessionError> {
        let mut session = self.repository.find(identifier)?;

        let live = match self.multiplexer.get_session(&session.name).await {
            Ok(live) => Some(live),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        reconcile(&mut session, live.as_ref());
        Ok(session)
    }

    pub async fn list_sessions(&self) -> Result<Vec<Session>, SessionError> {
        Ok(self.list_sessions_with_report().await?.sessions)
    }

    /// Reconciles every record against a single multiplexer listing.
    ///
    /// Also reports record files that were skipped as unreadable.
    pub async fn list_sessions_with_report(&self) -> Result<ListReport, SessionError> {
        let mut report = self.repository.list_with_report()?;
        for path in &report.skipped {
            warn!("Skipped unreadable session record {}", path.display());
        }

        let live: HashMap<String, MultiplexerSession> = self
            .multiplexer
            .list_sessions()
            .await?
            .into_iter()
            .map(|state| (state.name.clone(), state))
            .collect();

        debug!(
            "Reconciling {} records against {} live sessions",
            report.sessions.len(),
            live.len()
        );

        for session in &mut report.sessions {
            reconcile(session, live.get(&session.name));
        }

        // One pane query covers every running session
        if report.sessions.iter().any(|s| s.status.is_running() && s.pane_count == 0) {
            match self.multiplexer.list_pane_counts().await {
                Ok(counts) => {
                    for session in &mut report.sessions {
                        if session.status.is_running() && session.pane_count == 0 {
                            session.pane_count = counts.get(&session.name).copied().unwrap_or(0);
                        }
                    }
                }
                Err(e) => debug!("Pane counts unavailable: {}", e),
            }
        }

        Ok(report)
    }

    /// Kills the live session if there is one, then removes the record.
    ///
    /// A failed kill leaves the record in place.
    pub async fn delete_session(&self, identifier: &str) -> Result<(), SessionError> {
        let session = self.repository.find(identifier)?;

        if self.multiplexer.has_session(&session.name).await? {
            match self.multiplexer.kill_session(&session.name).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!("Session {} exited before it could be killed", session.name);
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.repository.delete(session.id)?;
        self.repository.save_index()?;

        info!("Deleted session {} ({})", session.name, session.id);
        Ok(())
    }

    /// Deletes every session, attempting all of them even after failures.
    ///
    /// Returns how many sessions were removed.
    pub async fn kill_all_sessions(&self) -> Result<usize, SessionError> {
        let sessions = self.repository.list()?;
        let attempted = sessions.len();
        let mut failures = Vec::new();

        for session in sessions {
            if let Err(e) = self.delete_session(&session.id.to_string()).await {
                warn!("Failed to delete session {}: {}", session.name, e);
                failures.push((session.name, e));
            }
        }

        if failures.is_empty() {
            Ok(attempted)
        } else {
            Err(SessionError::Aggregate {
                failures,
                attempted,
            })
        }
    }

    /// Hands the terminal to the session and blocks until the user detaches.
    pub async fn attach_to_session(&self, identifier: &str) -> Result<(), SessionError> {
        let mut session = self.repository.find(identifier)?;

        if !self.multiplexer.has_session(&session.name).await? {
            return Err(SessionError::NotRunning(session.name));
        }

        session.set_status(SessionStatus::Connected);
        if let Err(e) = self.repository.save(&session) {
            warn!("Failed to mark {} connected: {}", session.name, e);
        }

        let result = self.multiplexer.attach_to_session(&session.name).await;

        let status = if self.multiplexer.is_session_running(&session.name).await {
            SessionStatus::Active
        } else {
            SessionStatus::Inactive
        };
        session.set_status(status);
        if let Err(e) = self.repository.save(&session) {
            warn!("Failed to record status after detaching from {}: {}", session.name, e);
        }

        result.map_err(Into::into)
    }

    pub async fn is_session_running(&self, identifier: &str) -> bool {
        match self.repository.find(identifier) {
            Ok(session) => self.multiplexer.is_session_running(&session.name).await,
            Err(_) => false,
        }
    }
}

fn resolve_working_dir(working_dir: &str) -> Result<PathBuf, SessionError> {
    let working_dir = working_dir.trim();
    let cwd = || std::env::current_dir().map_err(|e| SessionError::io(".", e));

    if working_dir.is_empty() {
        return cwd();
    }

    let path = match working_dir.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map_or_else(|| PathBuf::from(working_dir), |home| home.join(rest)),
        None => PathBuf::from(working_dir),
    };

    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(cwd()?.join(path))
    }
}
