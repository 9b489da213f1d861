use super::legacy::try_migrate_legacy_data;
use super::PersistentStore;
use crate::config::LEGACY_BACKUP_FILE_NAME;
use crate::error::{AppError, AppResult};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Every key in one JSON document on local disk
#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    data: Mutex<Map<String, Value>>,
}

impl LocalStore {
    /// Open the store at `path`, creating the parent directory if needed.
    ///
    /// A missing file is an empty store. A file in the legacy layout is
    /// backed up, migrated and written back before use.
    pub fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let store = Self {
            data: Mutex::new(Map::new()),
            path,
        };

        if !store.path.exists() {
            info!(path = %store.path.display(), "No store file yet, starting empty");
            return Ok(store);
        }

        let content = fs::read_to_string(&store.path)?;
        let backup_path = store.path.with_file_name(LEGACY_BACKUP_FILE_NAME);
        let data = match try_migrate_legacy_data(&content, Some(backup_path.as_path())) {
            Some(migrated) => {
                store.write(&migrated)?;
                migrated
            }
            None => match serde_json::from_str::<Value>(&content)? {
                Value::Object(map) => map,
                _ => {
                    return Err(AppError::persistence(format!(
                        "{} is not a JSON object",
                        store.path.display()
                    )))
                }
            },
        };

        debug!(keys = data.len(), path = %store.path.display(), "Loaded store");
        *store.data.lock().unwrap_or_else(|e| e.into_inner()) = data;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write through a temp file and rename so the target is never half-written
    fn write(&self, data: &Map<String, Value>) -> AppResult<()> {
        let content = serde_json::to_string_pretty(data)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl PersistentStore for LocalStore {
    fn get(&self, key: &str) -> AppResult<Option<Value>> {
        let data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> AppResult<()> {
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = data.clone();
        next.insert(key.to_string(), value);
        self.write(&next)?;
        *data = next;
        Ok(())
    }
}
