//! Content factory for loading everything under one data directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use haunts_core::{GameConfig, Registries};

use crate::loaders::{ConfigLoader, LoadResult, PlayerStore, RegistryLoader, ScriptLoader};

/// Content factory that loads all game content from a data directory.
///
/// # Directory Structure
///
/// ```text
/// data_dir/
/// ├── config.toml
/// ├── houses/  rooms/  entities/  conditions/  gear/
/// ├── scenarios/lvl1.rhai
/// ├── ais/*.rhai
/// └── players/*.player
/// ```
pub struct ContentFactory {
    data_dir: PathBuf,
}

impl ContentFactory {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Load game configuration from `config.toml`, defaults when absent.
    pub fn load_config(&self) -> LoadResult<GameConfig> {
        ConfigLoader::load_or_default(&self.data_dir.join("config.toml"))
    }

    pub fn load_registries(&self) -> LoadResult<Arc<Registries>> {
        RegistryLoader::load(&self.data_dir).map(Arc::new)
    }

    pub fn scripts(&self) -> ScriptLoader {
        ScriptLoader::new(&self.data_dir)
    }

    pub fn players(&self) -> PlayerStore {
        PlayerStore::new(self.data_dir.join("players"))
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_paths() {
        let factory = ContentFactory::new("/tmp/data");
        assert_eq!(factory.data_dir(), Path::new("/tmp/data"));
        assert_eq!(
            factory.scripts().scenario_path("lvl1"),
            Path::new("/tmp/data/scenarios/lvl1.rhai")
        );
    }
}
