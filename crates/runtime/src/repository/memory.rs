//! In-memory SaveRepository for tests and headless runs.

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{RepositoryError, Result, SaveRepository, validate_slot};

#[derive(Default)]
pub struct InMemorySaveRepository {
    slots: Mutex<BTreeMap<String, String>>,
}

impl InMemorySaveRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SaveRepository for InMemorySaveRepository {
    fn save(&self, slot: &str, saved: &str) -> Result<()> {
        validate_slot(slot)?;
        self.slots
            .lock()
            .map_err(|_| RepositoryError::LockPoisoned)?
            .insert(slot.to_string(), saved.to_string());
        Ok(())
    }

    fn load(&self, slot: &str) -> Result<Option<String>> {
        Ok(self
            .slots
            .lock()
            .map_err(|_| RepositoryError::LockPoisoned)?
            .get(slot)
            .cloned())
    }

    fn delete(&self, slot: &str) -> Result<()> {
        self.slots
            .lock()
            .map_err(|_| RepositoryError::LockPoisoned)?
            .remove(slot);
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .slots
            .lock()
            .map_err(|_| RepositoryError::LockPoisoned)?
            .keys()
            .cloned()
            .collect())
    }
}
