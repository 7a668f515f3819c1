//! Repository layer for saved games.
//!
//! Quick saves and networked before/after states are opaque saved-game
//! strings; repositories store them in named slots.

mod error;
mod file;
mod memory;

pub use error::RepositoryError;
pub use file::FileSaveRepository;
pub use memory::InMemorySaveRepository;

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Named slots holding saved-game strings.
pub trait SaveRepository: Send {
    fn save(&self, slot: &str, saved: &str) -> Result<()>;

    /// `None` when the slot is empty.
    fn load(&self, slot: &str) -> Result<Option<String>>;

    fn delete(&self, slot: &str) -> Result<()>;

    /// Slot names in sorted order.
    fn list(&self) -> Result<Vec<String>>;
}

/// Slot names end up in file names.
pub(crate) fn validate_slot(slot: &str) -> Result<()> {
    let ok = !slot.is_empty()
        && slot
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(RepositoryError::InvalidSlot(slot.to_string()))
    }
}
