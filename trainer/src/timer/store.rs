//! Key-value storage for timer state.
//!
//! Keys are process-wide; scoping by puzzle key is what keeps two timers from
//! stepping on each other.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Prefix of per-puzzle deadline keys.
pub const DEADLINE_KEY_PREFIX: &str = "puzzle_timer_end_";

/// Liveness timestamp written on every heartbeat.
pub const HEARTBEAT_KEY: &str = "puzzle_timer_heartbeat";

pub fn deadline_key(puzzle_key: &str) -> String {
    format!("{}{}", DEADLINE_KEY_PREFIX, puzzle_key)
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("timer store unavailable: {0}")]
    Unavailable(String),
}

pub trait TimerStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

impl<T: TimerStore + ?Sized> TimerStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        (**self).keys()
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

/// In-process store. Clones share the same map, which is how tests simulate a
/// reload: drop the timer, keep the store.
#[derive(Debug, Clone, Default)]
pub struct MemoryTimerStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryTimerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimerStore for MemoryTimerStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().map_err(poisoned)?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.lock().map_err(poisoned)?.keys().cloned().collect())
    }
}

/// A single JSON object on disk mapping keys to values.
///
/// The file is read once on open and rewritten after every change.
#[derive(Debug)]
pub struct JsonTimerStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonTimerStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl TimerStore for JsonTimerStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.lock().map_err(poisoned)?.keys().cloned().collect())
    }
}
