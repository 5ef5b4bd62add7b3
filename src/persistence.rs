//! Storage for information that outlives a session: history and retained settings.

use crate::error::PersistenceError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Key holding the JSON array of history entries.
pub const HISTORY_KEY: &str = "HISTORY";
/// Key holding the retained prompts as a JSON object.
pub const PROMPT_KEY: &str = "PROMPT";
/// Session variable overriding the location of the standard store.
pub const PREFS_PATH_VAR: &str = "SHELL_LAUNCHER_PREFS";

const MAX_HISTORY: usize = 1000;

/// String key-value storage backing a session.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn put(&mut self, key: &str, value: &str) -> Result<(), PersistenceError>;
    fn remove(&mut self, key: &str) -> Result<(), PersistenceError>;
    fn keys(&self) -> Result<Vec<String>, PersistenceError>;

    /// Make previous writes durable.
    fn flush(&mut self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// Store handle shared between the caller and the sessions it launches.
pub type SharedStore = Arc<Mutex<dyn PreferenceStore + Send>>;
/// Plain mapping shared between the caller and the sessions it launches.
pub type SharedMap = Arc<Mutex<HashMap<String, String>>>;

impl PreferenceStore for HashMap<String, String> {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(HashMap::get(self, key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistenceError> {
        HashMap::remove(self, key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(HashMap::keys(self).cloned().collect())
    }
}

/// Which storage a session uses. Exactly one variant is active.
#[derive(Clone, Default)]
pub enum Persistence {
    /// The tool's own JSON file, created and owned by each session.
    #[default]
    Standard,
    /// A caller-provided store.
    Store(SharedStore),
    /// A caller-provided mapping.
    Map(SharedMap),
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Persistence::Standard => "Persistence::Standard",
            Persistence::Store(_) => "Persistence::Store",
            Persistence::Map(_) => "Persistence::Map",
        })
    }
}

impl Persistence {
    /// Open the storage for one session.
    ///
    /// The standard store is located through `env` (see [`standard_location`]).
    pub fn open(&self, env: &HashMap<String, String>) -> Result<SessionStore, PersistenceError> {
        let store: SharedStore = match self {
            Persistence::Standard => {
                let path = standard_location(env)?;
                log::debug!("Opening standard store at {}", path.display());
                Arc::new(Mutex::new(FileStore::open(path)?)) as SharedStore
            }
            Persistence::Store(store) => store.clone(),
            Persistence::Map(map) => map.clone() as SharedStore,
        };
        Ok(SessionStore { store })
    }
}

/// `$SHELL_LAUNCHER_PREFS` from the session environment, else
/// `<config dir>/shell-launcher/prefs.json`.
pub fn standard_location(env: &HashMap<String, String>) -> Result<PathBuf, PersistenceError> {
    if let Some(path) = env.get(PREFS_PATH_VAR).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let dir = dirs::config_dir().ok_or(PersistenceError::ConfigDirNotFound)?;
    Ok(dir.join("shell-launcher").join("prefs.json"))
}

/// JSON file store. Loaded on open, written atomically on flush.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    dirty: bool,
}

impl FileStore {
    /// Load `path`, or start empty when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| PersistenceError::Malformed {
                path: path.display().to_string(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.dirty = true;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistenceError> {
        self.dirty |= self.entries.remove(key).is_some();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn flush(&mut self) -> Result<(), PersistenceError> {
        if !self.dirty {
            return Ok(());
        }
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, &self.entries)?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path)?;
        self.dirty = false;
        log::debug!("Flushed {} entries to {}", self.entries.len(), self.path.display());
        Ok(())
    }
}

/// Prompts as retained by `/set prompt --retain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetainedPrompt {
    pub primary: String,
    pub continuation: String,
}

/// The store opened for one session, with typed accessors for the keys the shell uses.
pub struct SessionStore {
    store: SharedStore,
}

impl SessionStore {
    fn with<T>(
        &self,
        f: impl FnOnce(&mut (dyn PreferenceStore + Send)) -> Result<T, PersistenceError>,
    ) -> Result<T, PersistenceError> {
        let mut guard = self.store.lock().map_err(|_| PersistenceError::Poisoned)?;
        f(&mut *guard)
    }

    /// Stored history; an undecodable value is dropped with a warning.
    pub fn load_history(&self) -> Result<Vec<String>, PersistenceError> {
        let Some(raw) = self.with(|s| s.get(HISTORY_KEY))? else {
            return Ok(Vec::new());
        };
        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable history: {}", e);
            Vec::new()
        }))
    }

    /// Store the newest `MAX_HISTORY` entries.
    pub fn save_history(&self, history: &[String]) -> Result<(), PersistenceError> {
        let start = history.len().saturating_sub(MAX_HISTORY);
        let raw = serde_json::to_string(&history[start..])?;
        self.with(|s| s.put(HISTORY_KEY, &raw))
    }

    pub fn load_prompt(&self) -> Result<Option<RetainedPrompt>, PersistenceError> {
        let Some(raw) = self.with(|s| s.get(PROMPT_KEY))? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(prompt) => Ok(Some(prompt)),
            Err(e) => {
                log::warn!("Ignoring unreadable retained prompt: {}", e);
                Ok(None)
            }
        }
    }

    pub fn save_prompt(&self, prompt: &RetainedPrompt) -> Result<(), PersistenceError> {
        let raw = serde_json::to_string(prompt)?;
        self.with(|s| s.put(PROMPT_KEY, &raw))
    }

    pub fn flush(&self) -> Result<(), PersistenceError> {
        self.with(|s| s.flush())
    }
}
