//! Settings store adapter.
//!
//! Maps the fixed set of setup-form [`Field`]s and free-form engine keys onto
//! a [`SettingsBackend`]. The adapter owns the rules the backend does not
//! know about:
//!
//! - an empty string (or `null`) on save removes the key instead of storing it
//! - boolean fields are stored as the strings `"true"` / `"false"`
//! - deprecated keys are migrated once at startup (see [`SettingsStore::migrate`])
//! - backend failures are retried a bounded number of times

pub mod backend;
pub mod fields;

use std::collections::BTreeMap;
use std::sync::mpsc::Sender;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

pub use backend::{FileBackend, MemoryBackend, SettingsBackend};
pub use fields::{Field, FieldKind, FieldValue, LOCAL_KEYS_TO_MIGRATE};

use crate::error::SettingsError;

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Local key holding the saved private key.
pub const SSH_KEY: &str = "ssh_key";
/// Synced key with text printed to the terminal before the engine starts.
pub const TERM_INIT_STRING: &str = "term_init_string";

/// Default number of attempts for a backend operation.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Storage scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Per-machine storage.
    Local,
    /// Storage synchronized across the user's machines.
    Synced,
}

/// Values loaded for a set of fields. Unset fields map to `None`.
pub type FieldValues = BTreeMap<Field, Option<FieldValue>>;

/// Result of a deferred read, delivered through a completion channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingRead {
    pub scope: Scope,
    pub name: String,
    pub value: Option<Value>,
}

/// Outcome of the startup migration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// `(old, new)` pairs that were moved.
    pub migrated: Vec<(String, String)>,
}

impl MigrationReport {
    pub fn is_empty(&self) -> bool {
        self.migrated.is_empty()
    }
}

/// Shared handle to the settings collaborator.
#[derive(Clone)]
pub struct SettingsStore {
    backend: Arc<dyn SettingsBackend>,
    retry_attempts: u32,
}

impl SettingsStore {
    pub fn new(backend: Arc<dyn SettingsBackend>) -> Self {
        Self {
            backend,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }

    /// Set the number of attempts per backend operation (at least one).
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Convenience constructor over a fresh [`MemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    fn retry<T>(&self, what: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.retry_attempts => {
                    warn!("Settings {} failed (attempt {}): {}", what, attempt, e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Read a raw value.
    pub fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>> {
        self.retry("get", || self.backend.get(scope, key))
    }

    /// Write a raw value. `null` removes the key.
    pub fn set(&self, scope: Scope, key: &str, value: Value) -> Result<()> {
        if value.is_null() {
            return self.remove(scope, key);
        }
        self.retry("set", || self.backend.set(scope, key, value.clone()))
    }

    pub fn remove(&self, scope: Scope, key: &str) -> Result<()> {
        self.retry("remove", || self.backend.remove(scope, key))
    }

    /// Read `name` and deliver the result on `completions`.
    ///
    /// A closed receiver means the requesting window is gone; the result is
    /// dropped silently.
    pub fn read_into(&self, scope: Scope, name: &str, completions: &Sender<SettingRead>) -> Result<()> {
        let value = self.get(scope, name)?;
        let read = SettingRead {
            scope,
            name: name.to_string(),
            value,
        };
        if completions.send(read).is_err() {
            info!("Dropping read of '{}': requester closed", name);
        }
        Ok(())
    }

    /// Load the given form fields. Missing keys (and stored empty strings)
    /// come back as `None`.
    pub fn load(&self, fields: &[Field]) -> Result<FieldValues> {
        let mut out = FieldValues::new();
        for &field in fields {
            let value = match self.get(field.scope(), &field.key())? {
                Some(Value::String(s)) if s.is_empty() => None,
                Some(Value::String(s)) => Some(FieldValue::from_stored(field.kind(), &s)),
                Some(Value::Bool(b)) => Some(FieldValue::Bool(b)),
                Some(other) => Some(FieldValue::from_stored(field.kind(), &other.to_string())),
                None => None,
            };
            out.insert(field, value);
        }
        Ok(out)
    }

    /// Persist form fields. Absent or empty values remove the stored key.
    pub fn save<'a>(&self, values: impl IntoIterator<Item = (&'a Field, &'a Option<FieldValue>)>) -> Result<()> {
        for (field, value) in values {
            match value {
                Some(v) if !v.is_empty() => {
                    self.set(field.scope(), &field.key(), Value::String(v.to_stored()))?;
                }
                _ => self.remove(field.scope(), &field.key())?,
            }
        }
        Ok(())
    }

    /// Move every deprecated local key to its replacement.
    ///
    /// Returns only after every migration found to be needed has completed;
    /// the caller treats a successful return as "fields are ready". Running
    /// it again is a no-op because the old keys are gone.
    pub fn migrate(&self) -> Result<MigrationReport> {
        self.migrate_table(LOCAL_KEYS_TO_MIGRATE)
    }

    fn migrate_table(&self, table: &[(&str, &str)]) -> Result<MigrationReport> {
        let mut found = Vec::new();
        for &(old_key, new_key) in table {
            if let Some(value) = self.get(Scope::Local, old_key)? {
                found.push((old_key, new_key, value));
            }
        }

        let mut report = MigrationReport::default();
        for (old_key, new_key, value) in found {
            info!("Migrating {} to {}", old_key, new_key);
            self.set(Scope::Local, new_key, value)?;
            self.remove(Scope::Local, old_key)?;
            report.migrated.push((old_key.to_string(), new_key.to_string()));
        }
        Ok(report)
    }

    /// Save the private key; an empty key erases the saved one.
    pub fn save_ssh_key(&self, key: &str) -> Result<()> {
        if key.is_empty() {
            self.remove(Scope::Local, SSH_KEY)
        } else {
            self.set(Scope::Local, SSH_KEY, Value::String(key.to_string()))
        }
    }

    pub fn has_ssh_key(&self) -> Result<bool> {
        Ok(self.get(Scope::Local, SSH_KEY)?.is_some())
    }

    /// Text to print before the engine starts, if the user configured one.
    pub fn term_init_string(&self) -> Result<Option<String>> {
        Ok(match self.get(Scope::Synced, TERM_INIT_STRING)? {
            Some(Value::String(s)) => Some(s),
            _ => None,
        })
    }
}

/// Wash a value through a serialize/deserialize pass so only plain JSON
/// types reach the store.
pub fn normalize(key: &str, value: &Value) -> Result<Value> {
    let text = serde_json::to_string(value).map_err(|source| SettingsError::Serialize {
        key: key.to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| SettingsError::Serialize {
        key: key.to_string(),
        source,
    })
}
