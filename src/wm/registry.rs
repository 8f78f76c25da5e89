//! Registry of open session windows.
//!
//! Owned by the app controller and mutated from one control flow only.
//! Setup windows are not tracked here, so they never hold back a reload.

use std::collections::HashMap;

use tracing::{debug, info};

use super::update::{ReloadCheck, UpdatePolicy};
use crate::error::RegistryError;

pub struct WindowRegistry<H> {
    windows: HashMap<String, H>,
    update: UpdatePolicy,
}

impl<H> Default for WindowRegistry<H> {
    fn default() -> Self {
        Self {
            windows: HashMap::new(),
            update: UpdatePolicy::new(),
        }
    }
}

impl<H> WindowRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, handle: H) -> Result<(), RegistryError> {
        let id = id.into();
        if self.windows.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        info!("Registered window {}", id);
        self.windows.insert(id, handle);
        Ok(())
    }

    /// Remove `id` if present, then re-evaluate the reload condition.
    ///
    /// Removing an unknown id is not an error.
    pub fn unregister(&mut self, id: &str) -> ReloadCheck {
        match self.windows.remove(id) {
            Some(_) => info!("Unregistered window {}", id),
            None => debug!("Window {} was not registered", id),
        }
        self.update.evaluate(self.windows.len())
    }

    pub fn get(&self, id: &str) -> Option<&H> {
        self.windows.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut H> {
        self.windows.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.windows.contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.windows.len()
    }

    /// Record an available update and evaluate the reload condition.
    pub fn set_pending_update(&mut self, version: impl Into<String>) -> ReloadCheck {
        self.update.set_pending(version);
        self.update.evaluate(self.windows.len())
    }

    pub fn pending_update(&self) -> Option<&str> {
        self.update.pending()
    }
}
