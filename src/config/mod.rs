// ABOUTME: Application configuration loaded from a TOML file with environment overrides
// Decides where records and logs live and which multiplexer backend to drive

use crate::tmux::TmuxAdapter;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Overrides the data root (sessions and logs live beneath it)
pub const HOME_ENV: &str = "MUXKEEP_HOME";

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding one JSON record per session plus the name index
    pub sessions_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Multiplexer backend, e.g. `tmux`
    pub backend: String,
    /// Prepended to every multiplexer session name this tool creates
    pub prefix: String,
    /// Started in new sessions; empty means the multiplexer's default shell
    pub default_command: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_root = default_data_root().unwrap_or_else(|| PathBuf::from(".muxkeep"));
        Self::with_data_root(&data_root)
    }
}

impl AppConfig {
    fn with_data_root(data_root: &Path) -> Self {
        Self {
            sessions_dir: data_root.join("sessions"),
            log_dir: data_root.join("logs"),
            backend: TmuxAdapter::BACKEND_NAME.to_string(),
            prefix: TmuxAdapter::DEFAULT_PREFIX.to_string(),
            default_command: std::env::var("SHELL").unwrap_or_default(),
        }
    }

    /// Loads the user config file if there is one, otherwise defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default().apply_env()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(config.apply_env())
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "muxkeep", "muxkeep").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    fn apply_env(self) -> Self {
        match std::env::var_os(HOME_ENV) {
            Some(root) if !root.is_empty() => {
                let from_env = Self::with_data_root(Path::new(&root));
                Self {
                    sessions_dir: from_env.sessions_dir,
                    log_dir: from_env.log_dir,
                    ..self
                }
            }
            _ => self,
        }
    }

    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        for dir in [&self.sessions_dir, &self.log_dir] {
            fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

fn default_data_root() -> Option<PathBuf> {
    ProjectDirs::from("dev", "muxkeep", "muxkeep")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .or_else(|| dirs::home_dir().map(|home| home.join(".muxkeep")))
}
