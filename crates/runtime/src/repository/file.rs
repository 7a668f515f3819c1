//! File-based SaveRepository implementation.

use std::fs;
use std::path::{Path, PathBuf};

use super::{RepositoryError, Result, SaveRepository, validate_slot};

/// Stores each slot as `{slot}.sav` under a base directory.
///
/// Writes go to a temporary file first and are moved into place, so a
/// crash never leaves a truncated save behind.
pub struct FileSaveRepository {
    base_dir: PathBuf,
}

impl FileSaveRepository {
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.base_dir.join(format!("{slot}.sav"))
    }
}

impl SaveRepository for FileSaveRepository {
    fn save(&self, slot: &str, saved: &str) -> Result<()> {
        validate_slot(slot)?;
        let path = self.slot_path(slot);
        let temp_path = path.with_extension("sav.tmp");

        fs::write(&temp_path, saved)?;
        fs::rename(&temp_path, &path)?;

        tracing::debug!(target: "runtime::repository", slot, path = %path.display(), "saved");
        Ok(())
    }

    fn load(&self, slot: &str) -> Result<Option<String>> {
        validate_slot(slot)?;
        let path = self.slot_path(slot);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)
            .map_err(|e| RepositoryError::CorruptedData(format!("{}: {e}", path.display())))?;
        tracing::debug!(target: "runtime::repository", slot, "loaded");
        Ok(Some(text))
    }

    fn delete(&self, slot: &str) -> Result<()> {
        validate_slot(slot)?;
        let path = self.slot_path(slot);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut slots = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if let Some(name) = path.file_name().and_then(|s| s.to_str())
                && let Some(slot) = name.strip_suffix(".sav")
            {
                slots.push(slot.to_string());
            }
        }
        slots.sort_unstable();
        Ok(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileSaveRepository::new(dir.path().join("saves")).unwrap();
        assert_eq!(repo.load("quick").unwrap(), None);

        repo.save("quick", "AAAA").unwrap();
        repo.save("turn-2", "BBBB").unwrap();
        assert_eq!(repo.load("quick").unwrap().as_deref(), Some("AAAA"));
        assert_eq!(repo.list().unwrap(), ["quick", "turn-2"]);

        repo.delete("quick").unwrap();
        assert_eq!(repo.list().unwrap(), ["turn-2"]);
    }

    #[test]
    fn slot_names_cannot_escape() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileSaveRepository::new(dir.path()).unwrap();
        assert!(matches!(
            repo.save("../x", "data"),
            Err(RepositoryError::InvalidSlot(_))
        ));
    }
}
