// ABOUTME: Durable storage of session records, one JSON file per session id
// Keeps an in-memory name index persisted as a side file and rebuilt from records when unreadable

use super::error::SessionError;
use crate::models::Session;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Name of the persisted name index inside the sessions directory
pub const INDEX_FILE: &str = "index.json";

/// Files in the sessions directory that are never session records
pub const RESERVED_FILES: &[&str] = &[INDEX_FILE];

const RECORD_EXTENSION: &str = "json";

/// On-disk form of the name index
#[derive(Debug, Default, Serialize, Deserialize)]
struct NameIndex {
    sessions: HashMap<String, Uuid>,
}

/// Records from a directory scan plus the files that could not be parsed
#[derive(Debug, Default)]
pub struct ListReport {
    pub sessions: Vec<Session>,
    pub skipped: Vec<PathBuf>,
}

pub struct SessionRepository {
    storage_path: PathBuf,
    index: RwLock<HashMap<String, Uuid>>,
}

impl SessionRepository {
    /// Opens (creating if needed) a sessions directory and loads its name index.
    ///
    /// A missing or unparsable index is rebuilt from the record files and written back.
    pub fn open(storage_path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let storage_path = storage_path.into();
        fs::create_dir_all(&storage_path).map_err(|e| SessionError::io(&storage_path, e))?;

        let repository = Self {
            storage_path,
            index: RwLock::new(HashMap::new()),
        };

        match repository.load_index() {
            Ok(index) => {
                debug!("Loaded name index with {} entries", index.len());
                *repository.write_index()? = index;
            }
            Err(_) if !repository.index_path().exists() => {
                debug!("No name index in {}, building one", repository.storage_path.display());
                repository.rebuild_index()?;
            }
            Err(e) => {
                warn!("Name index unusable ({}), rebuilding from records", e);
                repository.rebuild_index()?;
            }
        }

        Ok(repository)
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.storage_path.join(format!("{id}.{RECORD_EXTENSION}"))
    }

    fn index_path(&self) -> PathBuf {
        self.storage_path.join(INDEX_FILE)
    }

    fn read_index(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Uuid>>, SessionError> {
        self.index.read().map_err(|_| SessionError::LockPoisoned)
    }

    fn write_index(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Uuid>>, SessionError> {
        self.index.write().map_err(|_| SessionError::LockPoisoned)
    }

    fn load_index(&self) -> Result<HashMap<String, Uuid>, SessionError> {
        let path = self.index_path();
        let content = fs::read_to_string(&path).map_err(|e| SessionError::io(&path, e))?;
        let index: NameIndex = serde_json::from_str(&content)
            .map_err(|source| SessionError::CorruptRecord { path, source })?;
        Ok(index.sessions)
    }

    /// Temp file in the same directory, then rename over the target
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), SessionError> {
        let mut temp = NamedTempFile::new_in(&self.storage_path)
            .map_err(|e| SessionError::io(&self.storage_path, e))?;

        temp.write_all(contents)
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| SessionError::io(temp.path(), e))?;

        temp.persist(path)
            .map_err(|e| SessionError::io(path, e.error))?;
        Ok(())
    }

    /// Persists a record and points the in-memory index at it.
    ///
    /// The index is not flushed to disk here; call [`Self::save_index`].
    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        {
            let mut index = self.write_index()?;
            // A renamed record must not leave its old name behind
            index.retain(|name, id| *id != session.id || *name == session.name);
            index.insert(session.name.clone(), session.id);
        }

        let json = serde_json::to_string_pretty(session)?;
        self.write_atomic(&self.record_path(session.id), json.as_bytes())?;

        debug!("Saved session {} ({})", session.name, session.id);
        Ok(())
    }

    pub fn find_by_id(&self, id: Uuid) -> Result<Session, SessionError> {
        let path = self.record_path(id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::NotFound(id.to_string()));
            }
            Err(e) => return Err(SessionError::io(&path, e)),
        };

        serde_json::from_str(&content).map_err(|source| SessionError::CorruptRecord { path, source })
    }

    pub fn find_by_name(&self, name: &str) -> Result<Session, SessionError> {
        let id = self
            .read_index()?
            .get(name)
            .copied()
            .ok_or_else(|| SessionError::NotFound(name.to_string()))?;

        self.find_by_id(id)
    }

    /// Resolves an identifier as an id first, then as a name.
    pub fn find(&self, identifier: &str) -> Result<Session, SessionError> {
        if let Ok(id) = Uuid::parse_str(identifier) {
            match self.find_by_id(id) {
                Err(SessionError::NotFound(_)) => {}
                found => return found,
            }
        }

        self.find_by_name(identifier)
    }

    pub fn exists(&self, identifier: &str) -> bool {
        let by_id = Uuid::parse_str(identifier)
            .map(|id| self.find_by_id(id).is_ok())
            .unwrap_or(false);

        by_id || self.find_by_name(identifier).is_ok()
    }

    /// All readable records, oldest first. Corrupt files are skipped.
    pub fn list(&self) -> Result<Vec<Session>, SessionError> {
        let report = self.list_with_report()?;
        for path in &report.skipped {
            warn!("Skipped unreadable session record {}", path.display());
        }
        Ok(report.sessions)
    }

    pub fn list_with_report(&self) -> Result<ListReport, SessionError> {
        let mut report = ListReport::default();

        let entries = match fs::read_dir(&self.storage_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(SessionError::io(&self.storage_path, e)),
        };

        for entry in entries {
            let path = entry.map_err(|e| SessionError::io(&self.storage_path, e))?.path();
            if !is_record_file(&path) {
                continue;
            }

            let parsed = fs::read_to_string(&path)
                .ok()
                .and_then(|content| serde_json::from_str::<Session>(&content).ok());

            match parsed {
                Some(session) => report.sessions.push(session),
                None => report.skipped.push(path),
            }
        }

        report
            .sessions
            .sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(report)
    }

    /// Removes the record file and then its index entry.
    pub fn delete(&self, id: Uuid) -> Result<(), SessionError> {
        let session = self.find_by_id(id)?;
        let path = self.record_path(id);

        fs::remove_file(&path).map_err(|e| SessionError::io(&path, e))?;

        let mut index = self.write_index()?;
        if index.get(&session.name) == Some(&id) {
            index.remove(&session.name);
        }

        debug!("Deleted session {} ({})", session.name, id);
        Ok(())
    }

    /// Flushes the in-memory index to its side file.
    pub fn save_index(&self) -> Result<(), SessionError> {
        let snapshot = NameIndex {
            sessions: self.read_index()?.clone(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        self.write_atomic(&self.index_path(), json.as_bytes())
    }

    /// Re-derives the index from the record files and persists it.
    pub fn rebuild_index(&self) -> Result<usize, SessionError> {
        let sessions = self.list()?;

        let mut rebuilt = HashMap::with_capacity(sessions.len());
        for session in sessions {
            // Oldest first, so a duplicated name resolves to the newest record
            rebuilt.insert(session.name, session.id);
        }

        let count = rebuilt.len();
        *self.write_index()? = rebuilt;
        self.save_index()?;

        info!("Rebuilt name index with {} entries", count);
        Ok(count)
    }

    /// Copy of the current name → id mapping
    pub fn index_snapshot(&self) -> Result<HashMap<String, Uuid>, SessionError> {
        Ok(self.read_index()?.clone())
    }
}

fn is_record_file(path: &Path) -> bool {
    let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };

    // In-flight temp files are dot-prefixed
    !file_name.starts_with('.')
        && !RESERVED_FILES.contains(&file_name)
        && path.extension().and_then(|ext| ext.to_str()) == Some(RECORD_EXTENSION)
        && path.is_file()
}
