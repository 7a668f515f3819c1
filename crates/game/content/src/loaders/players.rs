//! Player records under `players/<name>.player`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::loaders::{LoadResult, files_with_extension, parse_named};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerRecord {
    pub name: String,
    #[serde(default)]
    pub games_played: u32,
    #[serde(default)]
    pub wins: u32,
}

impl PlayerRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn record_game(&mut self, won: bool) {
        self.games_played += 1;
        if won {
            self.wins += 1;
        }
    }
}

pub struct PlayerStore {
    dir: PathBuf,
}

impl PlayerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.player"))
    }

    /// `None` when the player has never been saved.
    pub fn load(&self, name: &str) -> LoadResult<Option<PlayerRecord>> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(None);
        }
        parse_named(&path).map(Some)
    }

    pub fn load_or_new(&self, name: &str) -> LoadResult<PlayerRecord> {
        Ok(self.load(name)?.unwrap_or_else(|| PlayerRecord::new(name)))
    }

    /// Writes through a temporary file so a crash never leaves half a record.
    pub fn save(&self, record: &PlayerRecord) -> LoadResult<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.path(&record.name);
        let tmp = path.with_extension("player.tmp");
        let text = serde_json::to_string_pretty(record)?;
        std::fs::write(&tmp, text).with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to move {} into place", tmp.display()))?;
        debug!(target: "content::loader", player = %record.name, "player saved");
        Ok(())
    }

    pub fn list(&self) -> LoadResult<Vec<String>> {
        Ok(files_with_extension(&self.dir, "player")?
            .iter()
            .filter_map(|p| Path::file_stem(p).and_then(|s| s.to_str()).map(str::to_owned))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_persist() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlayerStore::new(dir.path().join("players"));
        assert_eq!(store.load("ada").unwrap(), None);

        let mut record = store.load_or_new("ada").unwrap();
        record.record_game(true);
        record.record_game(false);
        store.save(&record).unwrap();

        let loaded = store.load("ada").unwrap().unwrap();
        assert_eq!(loaded.games_played, 2);
        assert_eq!(loaded.wins, 1);
        assert_eq!(store.list().unwrap(), ["ada"]);
    }
}
