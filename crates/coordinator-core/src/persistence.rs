//! State that survives a disconnect
//!
//! The controller keeps a [`PersistedState`] in memory and writes it through a
//! [`SessionStore`] whenever one of its fields changes. Load failures fall
//! back to an empty state; nothing here is allowed to stop a session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{SessionError, SessionResult};
use crate::types::Position;

/// Key-value fields kept across disconnects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// Where the local player was when the connection dropped
    pub last_position: Option<Position>,
    /// Last room successfully joined
    pub room_name: Option<String>,
    /// Saved avatar selection, opaque to the coordinator
    pub avatar: Option<String>,
}

/// Storage backend for [`PersistedState`]
pub trait SessionStore: Send {
    fn load(&self) -> SessionResult<PersistedState>;

    fn save(&mut self, state: &PersistedState) -> SessionResult<()>;
}

/// In-memory store; clones share the same state
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<PersistedState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Current contents
    pub fn snapshot(&self) -> PersistedState {
        self.state.lock().clone()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> SessionResult<PersistedState> {
        Ok(self.snapshot())
    }

    fn save(&mut self, state: &PersistedState) -> SessionResult<()> {
        *self.state.lock() = state.clone();
        Ok(())
    }
}

/// Pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for JsonFileStore {
    fn load(&self) -> SessionResult<PersistedState> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No persisted state yet");
            return Ok(PersistedState::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&mut self, state: &PersistedState) -> SessionResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Readers only ever see a complete file
        let tmp = self.path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(state)?;
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            SessionError::persistence(format!("Failed to replace {}: {}", self.path.display(), e))
        })?;
        Ok(())
    }
}

/// Load from `store`, logging and swallowing failures
pub fn load_or_default(store: &dyn SessionStore) -> PersistedState {
    match store.load() {
        Ok(state) => state,
        Err(e) => {
            warn!(error = %e, "Failed to load persisted state, starting fresh");
            PersistedState::default()
        }
    }
}
