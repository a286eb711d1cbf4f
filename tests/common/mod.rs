// ABOUTME: Shared test fixtures: an in-memory multiplexer and repository helpers
// The fake records every call so tests can assert how often the backend was queried

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use muxkeep::models::Session;
use muxkeep::multiplexer::{Multiplexer, MultiplexerError, MultiplexerSession};
use muxkeep::session::{SessionRepository, SessionService};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const FAKE_PREFIX: &str = "fake_";

#[derive(Default)]
struct FakeState {
    sessions: HashMap<String, MultiplexerSession>,
    fail_create: bool,
    fail_kill: HashSet<String>,
    list_calls: usize,
    pane_list_calls: usize,
    create_calls: usize,
    killed: Vec<String>,
    attached: Vec<String>,
}

/// In-memory multiplexer with scripted failures
#[derive(Default)]
pub struct FakeMultiplexer {
    state: Mutex<FakeState>,
}

impl FakeMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_running(&self, name: &str, attached: bool, panes: usize) {
        let mut session = MultiplexerSession::new(name, format!("{FAKE_PREFIX}{name}"))
            .with_attached(attached)
            .with_created_at(Some(Utc::now()));
        session.pane_count = panes;
        self.state.lock().unwrap().sessions.insert(name.to_string(), session);
    }

    pub fn fail_create(&self) {
        self.state.lock().unwrap().fail_create = true;
    }

    pub fn fail_kill_for(&self, name: &str) {
        self.state.lock().unwrap().fail_kill.insert(name.to_string());
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn pane_list_calls(&self) -> usize {
        self.state.lock().unwrap().pane_list_calls
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    pub fn killed(&self) -> Vec<String> {
        self.state.lock().unwrap().killed.clone()
    }

    pub fn attached(&self) -> Vec<String> {
        self.state.lock().unwrap().attached.clone()
    }

    pub fn is_live(&self, name: &str) -> bool {
        self.state.lock().unwrap().sessions.contains_key(name)
    }
}

#[async_trait]
impl Multiplexer for FakeMultiplexer {
    fn get_name(&self) -> &str {
        "fake"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn session_handle(&self, name: &str) -> String {
        format!("{FAKE_PREFIX}{name}")
    }

    async fn create_session(
        &self,
        name: &str,
        _working_dir: &Path,
        _command: &str,
    ) -> Result<MultiplexerSession, MultiplexerError> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;

        if state.fail_create {
            return Err(MultiplexerError::CommandFailed {
                command: "fake new-session".to_string(),
                stderr: "simulated create failure".to_string(),
            });
        }
        if state.sessions.contains_key(name) {
            return Err(MultiplexerError::SessionExists(name.to_string()));
        }

        let mut session = MultiplexerSession::new(name, self.session_handle(name))
            .with_created_at(Some(Utc::now()));
        session.pane_count = 1;
        state.sessions.insert(name.to_string(), session.clone());
        Ok(session)
    }

    async fn get_session(&self, name: &str) -> Result<MultiplexerSession, MultiplexerError> {
        self.state
            .lock()
            .unwrap()
            .sessions
            .get(name)
            .cloned()
            .ok_or_else(|| MultiplexerError::SessionNotFound(name.to_string()))
    }

    async fn list_sessions(&self) -> Result<Vec<MultiplexerSession>, MultiplexerError> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        // Like tmux's listing, snapshots carry no pane data
        Ok(state
            .sessions
            .values()
            .map(|session| {
                let mut session = session.clone();
                session.pane_count = 0;
                session
            })
            .collect())
    }

    async fn attach_to_session(&self, name: &str) -> Result<(), MultiplexerError> {
        let mut state = self.state.lock().unwrap();
        if !state.sessions.contains_key(name) {
            return Err(MultiplexerError::SessionNotFound(name.to_string()));
        }
        state.attached.push(name.to_string());
        Ok(())
    }

    async fn kill_session(&self, name: &str) -> Result<(), MultiplexerError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_kill.contains(name) {
            return Err(MultiplexerError::CommandFailed {
                command: format!("fake kill-session {name}"),
                stderr: "simulated kill failure".to_string(),
            });
        }
        if state.sessions.remove(name).is_none() {
            return Err(MultiplexerError::SessionNotFound(name.to_string()));
        }
        state.killed.push(name.to_string());
        Ok(())
    }

    async fn kill_all_sessions(&self) -> Result<(), MultiplexerError> {
        let names: Vec<String> = self.state.lock().unwrap().sessions.keys().cloned().collect();
        let attempted = names.len();
        let mut failures = Vec::new();

        for name in names {
            if let Err(e) = self.kill_session(&name).await {
                failures.push((name, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(MultiplexerError::Aggregate { failures, attempted })
        }
    }

    async fn is_session_running(&self, name: &str) -> bool {
        self.is_live(name)
    }

    async fn has_session(&self, name: &str) -> Result<bool, MultiplexerError> {
        Ok(self.is_live(name))
    }

    async fn get_session_pane_count(&self, name: &str) -> Result<usize, MultiplexerError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .sessions
            .get(name)
            .map_or(0, |session| session.pane_count))
    }

    async fn list_pane_counts(&self) -> Result<HashMap<String, usize>, MultiplexerError> {
        let mut state = self.state.lock().unwrap();
        state.pane_list_calls += 1;
        Ok(state
            .sessions
            .iter()
            .map(|(name, session)| (name.clone(), session.pane_count))
            .collect())
    }
}

/// A service over a fresh temp directory and a fake multiplexer
pub struct Harness {
    pub temp_dir: TempDir,
    pub repository: Arc<SessionRepository>,
    pub multiplexer: Arc<FakeMultiplexer>,
    pub service: SessionService,
}

impl Harness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let repository = Arc::new(SessionRepository::open(temp_dir.path().join("sessions")).unwrap());
        let multiplexer = Arc::new(FakeMultiplexer::new());
        let service = SessionService::new(Arc::clone(&repository), multiplexer.clone())
            .with_default_command("bash");

        Self {
            temp_dir,
            repository,
            multiplexer,
            service,
        }
    }

    pub fn project_dir(&self) -> String {
        self.temp_dir.path().to_string_lossy().to_string()
    }
}

pub fn sample_session(name: &str) -> Session {
    Session::new(
        name.to_string(),
        format!("{name} description"),
        format!("/projects/{name}"),
        "fake".to_string(),
    )
}
