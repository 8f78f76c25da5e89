//! Key-value persistence collaborators.
//!
//! Two scopes (`local`, `synced`) of string-or-JSON values, last write wins.
//! `MemoryBackend` backs tests and demo mode; `FileBackend` keeps both scopes
//! in a single TOML document.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::Scope;
use crate::error::SettingsError;

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Storage collaborator for settings values.
pub trait SettingsBackend: Send + Sync {
    fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>>;
    fn set(&self, scope: Scope, key: &str, value: Value) -> Result<()>;
    fn remove(&self, scope: Scope, key: &str) -> Result<()>;
}

/// In-process store, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<(Scope, String), Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys currently stored in `scope`, sorted.
    pub fn keys(&self, scope: Scope) -> Vec<String> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = values
            .keys()
            .filter(|(s, _)| *s == scope)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl SettingsBackend for MemoryBackend {
    fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(&(scope, key.to_string())).cloned())
    }

    fn set(&self, scope: Scope, key: &str, value: Value) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert((scope, key.to_string()), value);
        Ok(())
    }

    fn remove(&self, scope: Scope, key: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.remove(&(scope, key.to_string()));
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct SettingsFile {
    local: toml::Table,
    synced: toml::Table,
}

impl SettingsFile {
    fn table(&self, scope: Scope) -> &toml::Table {
        match scope {
            Scope::Local => &self.local,
            Scope::Synced => &self.synced,
        }
    }

    fn table_mut(&mut self, scope: Scope) -> &mut toml::Table {
        match scope {
            Scope::Local => &mut self.local,
            Scope::Synced => &mut self.synced,
        }
    }
}

/// TOML file holding `[local]` and `[synced]` tables.
///
/// The whole document is rewritten on every mutation.
pub struct FileBackend {
    path: PathBuf,
    contents: Mutex<SettingsFile>,
}

impl FileBackend {
    /// Open (or lazily create) the settings file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let contents = if path.exists() {
            let text = fs::read_to_string(&path).map_err(SettingsError::Io)?;
            toml::from_str(&text).map_err(SettingsError::Parse)?
        } else {
            SettingsFile::default()
        };
        debug!("Settings file: {}", path.display());
        Ok(Self {
            path,
            contents: Mutex::new(contents),
        })
    }

    fn flush(&self, contents: &SettingsFile) -> Result<()> {
        let text = toml::to_string_pretty(contents).map_err(SettingsError::Encode)?;
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(SettingsError::Io)?;
            }
        }
        fs::write(&self.path, text).map_err(SettingsError::Io)
    }
}

impl SettingsBackend for FileBackend {
    fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>> {
        let contents = self.contents.lock().unwrap_or_else(|e| e.into_inner());
        match contents.table(scope).get(key) {
            Some(value) => serde_json::to_value(value)
                .map(Some)
                .map_err(|source| SettingsError::Serialize {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn set(&self, scope: Scope, key: &str, value: Value) -> Result<()> {
        // TOML has no null; nulls anywhere in the value are rejected here.
        let value = toml::Value::try_from(&value).map_err(|e| SettingsError::Backend {
            scope,
            key: key.to_string(),
            message: e.to_string(),
        })?;
        let mut contents = self.contents.lock().unwrap_or_else(|e| e.into_inner());
        contents.table_mut(scope).insert(key.to_string(), value);
        self.flush(&contents)
    }

    fn remove(&self, scope: Scope, key: &str) -> Result<()> {
        let mut contents = self.contents.lock().unwrap_or_else(|e| e.into_inner());
        if contents.table_mut(scope).remove(key).is_some() {
            self.flush(&contents)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_scopes_are_independent() {
        let backend = MemoryBackend::new();
        backend.set(Scope::Local, "k", json!("local")).unwrap();
        backend.set(Scope::Synced, "k", json!("synced")).unwrap();

        assert_eq!(backend.get(Scope::Local, "k").unwrap(), Some(json!("local")));
        assert_eq!(backend.get(Scope::Synced, "k").unwrap(), Some(json!("synced")));

        backend.remove(Scope::Local, "k").unwrap();
        assert_eq!(backend.get(Scope::Local, "k").unwrap(), None);
        assert_eq!(backend.keys(Scope::Synced), vec!["k".to_string()]);
    }

    #[test]
    fn test_file_backend_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let backend = FileBackend::open(&path).unwrap();
        backend.set(Scope::Local, "field_addr", json!("example.com")).unwrap();
        backend.set(Scope::Synced, "known_hosts", json!({"example.com": "ssh-ed25519 AAAA"})).unwrap();
        drop(backend);

        let reopened = FileBackend::open(&path).unwrap();
        assert_eq!(
            reopened.get(Scope::Local, "field_addr").unwrap(),
            Some(json!("example.com"))
        );
        assert_eq!(
            reopened.get(Scope::Synced, "known_hosts").unwrap(),
            Some(json!({"example.com": "ssh-ed25519 AAAA"}))
        );
        assert_eq!(reopened.get(Scope::Synced, "field_addr").unwrap(), None);
    }

    #[test]
    fn test_file_backend_rejects_null() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path().join("s.toml")).unwrap();
        assert!(backend.set(Scope::Local, "k", json!([1, null])).is_err());
    }
}
