//! Scenario and AI script sources.

use std::path::{Path, PathBuf};

use crate::loaders::{LoadResult, read_file};

/// Locates scripts under `data_dir/scenarios` and `data_dir/ais`.
pub struct ScriptLoader {
    data_dir: PathBuf,
}

impl ScriptLoader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn scenario_path(&self, name: &str) -> PathBuf {
        script_path(&self.data_dir.join("scenarios"), name)
    }

    pub fn ai_path(&self, name: &str) -> PathBuf {
        script_path(&self.data_dir.join("ais"), name)
    }

    pub fn scenario(&self, name: &str) -> LoadResult<String> {
        read_file(&self.scenario_path(name))
    }

    pub fn ai(&self, name: &str) -> LoadResult<String> {
        read_file(&self.ai_path(name))
    }
}

/// `name` may be given with or without the `.rhai` extension.
fn script_path(dir: &Path, name: &str) -> PathBuf {
    if name.ends_with(".rhai") {
        dir.join(name)
    } else {
        dir.join(format!("{name}.rhai"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_optional() {
        let loader = ScriptLoader::new("/data");
        assert_eq!(loader.scenario_path("lvl1"), Path::new("/data/scenarios/lvl1.rhai"));
        assert_eq!(loader.ai_path("minion.rhai"), Path::new("/data/ais/minion.rhai"));
    }
}
