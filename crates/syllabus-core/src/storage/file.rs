//! Preferences persisted as a JSON object of strings.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::PreferenceStore;
use crate::error::StorageError;

/// A preference file, loaded on open and rewritten on every `set`.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl FilePreferences {
    /// Open `path`, starting empty when it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let text = fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&text)
                    .map_err(|e| StorageError::Corrupt(format!("{}: {}", path.display(), e)))?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(values)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;
        // Replace atomically via rename.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self
            .values
            .read()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self
            .values
            .write()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)?;
        tracing::debug!("Wrote preference {} to {}", key, self.path.display());
        Ok(())
    }
}
