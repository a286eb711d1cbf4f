// ABOUTME: tmux implementation of the Multiplexer capability interface
// Namespaces every session with a prefix and never touches sessions outside it

use super::format::{self, ALL_PANES_FORMAT, LIST_FORMAT, PANE_FORMAT};
use super::runner::{self, CommandOutput, CommandRunner, ProcessRunner};
use crate::multiplexer::{Multiplexer, MultiplexerError, MultiplexerSession};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct TmuxAdapter {
    prefix: String,
    runner: Option<Arc<dyn CommandRunner>>,
    /// Attaching from inside tmux must switch the client instead of nesting
    inside_tmux: bool,
}

impl TmuxAdapter {
    pub const BACKEND_NAME: &'static str = "tmux";
    pub const DEFAULT_PREFIX: &'static str = "muxkeep_";
    const HISTORY_LIMIT: &'static str = "10000";

    /// Builds an adapter around whichever tmux binary discovery finds.
    pub fn discover(prefix: &str) -> Self {
        let runner = match runner::discover_tmux() {
            Some(binary) => {
                info!("Using tmux at {}", binary.display());
                Some(Arc::new(ProcessRunner::new(binary)) as Arc<dyn CommandRunner>)
            }
            None => {
                warn!("tmux not found on PATH or in fallback locations");
                None
            }
        };

        Self {
            prefix: prefix.to_string(),
            runner,
            inside_tmux: std::env::var_os("TMUX").is_some(),
        }
    }

    pub fn with_runner(prefix: &str, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            prefix: prefix.to_string(),
            runner: Some(runner),
            inside_tmux: false,
        }
    }

    /// An adapter whose binary could not be found
    pub fn unavailable(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            runner: None,
            inside_tmux: false,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn runner(&self) -> Result<&dyn CommandRunner, MultiplexerError> {
        self.runner
            .as_deref()
            .ok_or_else(|| MultiplexerError::NotInstalled(Self::BACKEND_NAME.to_string()))
    }

    /// Exact-match target so `api` never resolves to `api-old`
    fn target(&self, name: &str) -> String {
        format!("={}", self.session_handle(name))
    }

    async fn run(&self, args: &[&str]) -> Result<CommandOutput, MultiplexerError> {
        let runner = self.runner()?;
        debug!("tmux {}", args.join(" "));

        let output = runner
            .output(args.iter().map(ToString::to_string).collect())
            .await?;
        Ok(output)
    }

    fn command_failed(args: &[&str], output: &CommandOutput) -> MultiplexerError {
        MultiplexerError::CommandFailed {
            command: format!("tmux {}", args.join(" ")),
            stderr: output.stderr.clone(),
        }
    }
}

#[async_trait]
impl Multiplexer for TmuxAdapter {
    fn get_name(&self) -> &str {
        Self::BACKEND_NAME
    }

    fn is_available(&self) -> bool {
        self.runner.is_some()
    }

    fn session_handle(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    async fn create_session(
        &self,
        name: &str,
        working_dir: &Path,
        command: &str,
    ) -> Result<MultiplexerSession, MultiplexerError> {
        self.runner()?;

        if self.has_session(name).await? {
            return Err(MultiplexerError::SessionExists(name.to_string()));
        }

        let handle = self.session_handle(name);
        let working_dir = working_dir.to_string_lossy();
        let mut args = vec!["new-session", "-d", "-s", handle.as_str(), "-c", &*working_dir];
        if !command.trim().is_empty() {
            args.push(command);
        }

        let output = self.run(&args).await?;
        if !output.success {
            return Err(Self::command_failed(&args, &output));
        }

        let target = self.target(name);
        let history = ["set-option", "-t", target.as_str(), "history-limit", Self::HISTORY_LIMIT];
        match self.run(&history).await {
            Ok(result) if !result.success => {
                warn!("Failed to set history-limit on {}: {}", handle, result.stderr);
            }
            Err(e) => warn!("Failed to set history-limit on {}: {}", handle, e),
            Ok(_) => {}
        }

        info!("Created tmux session {} in {}", handle, working_dir);

        let mut session = MultiplexerSession::new(name, handle).with_created_at(Some(Utc::now()));
        session.pane_count = 1;
        Ok(session)
    }

    async fn get_session(&self, name: &str) -> Result<MultiplexerSession, MultiplexerError> {
        let mut session = self
            .list_sessions()
            .await?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| MultiplexerError::SessionNotFound(name.to_string()))?;

        session.pane_count = self.get_session_pane_count(name).await?;
        Ok(session)
    }

    async fn list_sessions(&self) -> Result<Vec<MultiplexerSession>, MultiplexerError> {
        let args = ["list-sessions", "-F", LIST_FORMAT];
        let output = self.run(&args).await?;

        if !output.success {
            if format::is_no_server(&output.stderr) {
                debug!("tmux server not running, no sessions to list");
                return Ok(Vec::new());
            }
            return Err(Self::command_failed(&args, &output));
        }

        Ok(format::parse_session_list(&output.stdout, &self.prefix))
    }

    async fn attach_to_session(&self, name: &str) -> Result<(), MultiplexerError> {
        let runner = self.runner()?;

        if !self.has_session(name).await? {
            return Err(MultiplexerError::SessionNotFound(name.to_string()));
        }

        let verb = if self.inside_tmux {
            "switch-client"
        } else {
            "attach-session"
        };
        let args = vec![verb.to_string(), "-t".to_string(), self.target(name)];

        info!("Attaching to tmux session {} via {}", self.session_handle(name), verb);
        if runner.interactive(args).await? {
            Ok(())
        } else {
            Err(MultiplexerError::AttachFailed(name.to_string()))
        }
    }

    async fn kill_session(&self, name: &str) -> Result<(), MultiplexerError> {
        let target = self.target(name);
        let args = ["kill-session", "-t", target.as_str()];
        let output = self.run(&args).await?;

        if output.success {
            info!("Killed tmux session {}", self.session_handle(name));
            return Ok(());
        }

        if format::is_missing_session(&output.stderr) {
            Err(MultiplexerError::SessionNotFound(name.to_string()))
        } else {
            Err(Self::command_failed(&args, &output))
        }
    }

    async fn kill_all_sessions(&self) -> Result<(), MultiplexerError> {
        let sessions = self.list_sessions().await?;
        let attempted = sessions.len();
        let mut failures = Vec::new();

        for session in sessions {
            if let Err(e) = self.kill_session(&session.name).await {
                warn!("Failed to kill tmux session {}: {}", session.handle(), e);
                failures.push((session.name, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(MultiplexerError::Aggregate { failures, attempted })
        }
    }

    async fn is_session_running(&self, name: &str) -> bool {
        self.has_session(name).await.unwrap_or(false)
    }

    async fn has_session(&self, name: &str) -> Result<bool, MultiplexerError> {
        let target = self.target(name);
        let args = ["has-session", "-t", target.as_str()];
        let output = self.run(&args).await?;

        if output.success {
            Ok(true)
        } else if format::is_missing_session(&output.stderr) {
            Ok(false)
        } else {
            Err(Self::command_failed(&args, &output))
        }
    }

    async fn list_pane_counts(&self) -> Result<HashMap<String, usize>, MultiplexerError> {
        let args = ["list-panes", "-a", "-F", ALL_PANES_FORMAT];
        let output = self.run(&args).await?;

        if !output.success {
            if format::is_no_server(&output.stderr) {
                return Ok(HashMap::new());
            }
            return Err(Self::command_failed(&args, &output));
        }

        Ok(format::group_panes_by_session(&output.stdout, &self.prefix))
    }

    async fn get_session_pane_count(&self, name: &str) -> Result<usize, MultiplexerError> {
        if !self.has_session(name).await? {
            return Ok(0);
        }

        let target = self.target(name);
        let args = ["list-panes", "-s", "-t", target.as_str(), "-F", PANE_FORMAT];
        let output = self.run(&args).await?;

        if output.success {
            Ok(format::count_panes(&output.stdout))
        } else if format::is_missing_session(&output.stderr) {
            // Killed between the probe and the listing
            Ok(0)
        } else {
            Err(Self::command_failed(&args, &output))
        }
    }
}
