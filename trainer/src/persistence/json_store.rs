use super::PersistenceError;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A record that knows the file name it is stored under.
pub trait Storable: Serialize + DeserializeOwned {
    fn id(&self) -> &str;
}

/// One pretty-printed JSON file per record, all in one directory.
pub struct JsonStore<T> {
    dir: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T: Storable> JsonStore<T> {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            _phantom: PhantomData,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Save a record, replacing any earlier one with the same id. Returns the id.
    pub fn save(&self, data: &T) -> Result<String, PersistenceError> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(data)?;
        std::fs::write(self.file_path(data.id()), json)?;
        Ok(data.id().to_string())
    }

    /// Load every record in the directory. Unreadable or unparseable files are
    /// skipped with a warning.
    pub fn load_all(&self) -> Result<Vec<T>, PersistenceError> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }
        let mut items = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = std::fs::read_to_string(&path)
                .map_err(PersistenceError::from)
                .and_then(|contents| Ok(serde_json::from_str::<T>(&contents)?));
            match parsed {
                Ok(data) => items.push(data),
                Err(e) => tracing::warn!("Skipping {:?}: {}", path, e),
            }
        }
        Ok(items)
    }
}
