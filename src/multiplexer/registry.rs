// ABOUTME: Registry of multiplexer adapters, built once at startup and passed by reference
// Caches adapters per (backend, prefix) so binary discovery runs once per process

use super::{Multiplexer, MultiplexerError};
use crate::tmux::TmuxAdapter;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Backends this build knows how to construct
pub const SUPPORTED_BACKENDS: &[&str] = &[TmuxAdapter::BACKEND_NAME];

type AdapterKey = (String, String);

#[derive(Default)]
pub struct AdapterRegistry {
    adapters: Mutex<HashMap<AdapterKey, Arc<dyn Multiplexer>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs an adapter for a key, replacing any cached one. Used to inject fakes.
    pub fn register(&self, backend: &str, prefix: &str, adapter: Arc<dyn Multiplexer>) {
        self.adapters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((backend.to_string(), prefix.to_string()), adapter);
    }

    /// Returns the cached adapter for `backend` + `prefix`, constructing it on first use.
    pub fn get(&self, backend: &str, prefix: &str) -> Result<Arc<dyn Multiplexer>, MultiplexerError> {
        let mut adapters = self.adapters.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (backend.to_string(), prefix.to_string());

        if let Some(adapter) = adapters.get(&key) {
            return Ok(Arc::clone(adapter));
        }

        let adapter: Arc<dyn Multiplexer> = match backend {
            TmuxAdapter::BACKEND_NAME => Arc::new(TmuxAdapter::discover(prefix)),
            other => return Err(MultiplexerError::UnknownBackend(other.to_string())),
        };

        debug!(
            "Created {} adapter for prefix {:?} (available: {})",
            backend,
            prefix,
            adapter.is_available()
        );
        adapters.insert(key, Arc::clone(&adapter));
        Ok(adapter)
    }

    pub fn len(&self) -> usize {
        self.adapters.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
