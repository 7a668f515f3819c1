//! Game configuration loader.

use std::path::Path;

use anyhow::Context;
use haunts_core::GameConfig;
use tracing::debug;

use crate::loaders::{LoadResult, read_file};

/// Loader for game configuration from TOML files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config data from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> LoadResult<GameConfig> {
        let content = read_file(path)?;
        let config: GameConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config TOML {}", path.display()))?;
        Ok(config)
    }

    /// Like [`ConfigLoader::load`], but an absent file yields the defaults.
    pub fn load_or_default(path: &Path) -> LoadResult<GameConfig> {
        if !path.exists() {
            debug!(target: "content::loader", path = %path.display(), "no config file, using defaults");
            return Ok(GameConfig::default());
        }
        Self::load(path)
    }
}
