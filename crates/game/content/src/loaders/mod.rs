//! Content loaders for reading game data from files.

pub mod config;
pub mod factory;
pub mod players;
pub mod registry;
pub mod scripts;

pub use config::ConfigLoader;
pub use factory::ContentFactory;
pub use players::{PlayerRecord, PlayerStore};
pub use registry::RegistryLoader;
pub use scripts::ScriptLoader;

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Common result type for loaders.
pub type LoadResult<T> = anyhow::Result<T>;

/// Helper function to read file contents.
pub(crate) fn read_file(path: &Path) -> LoadResult<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Files directly under `dir` with extension `ext`, sorted by path. A missing
/// directory yields nothing.
pub(crate) fn files_with_extension(dir: &Path, ext: &str) -> LoadResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        debug!(target: "content::loader", dir = %dir.display(), "no such directory");
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == ext) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Parses one document. It must be a JSON object with a string `Name`.
pub(crate) fn parse_named<T: DeserializeOwned>(path: &Path) -> LoadResult<T> {
    let text = read_file(path)?;
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))?;
    match value.get("Name") {
        Some(serde_json::Value::String(_)) => {}
        _ => anyhow::bail!("{} has no string Name field", path.display()),
    }
    serde_json::from_value(value).with_context(|| format!("malformed document {}", path.display()))
}

/// Loads every named document of one kind. Documents that fail to load are
/// logged and skipped.
pub(crate) fn load_named_dir<T: DeserializeOwned>(dir: &Path, ext: &str) -> LoadResult<Vec<T>> {
    let mut docs = Vec::new();
    for path in files_with_extension(dir, ext)? {
        match parse_named(&path) {
            Ok(doc) => docs.push(doc),
            Err(err) => {
                warn!(target: "content::loader", path = %path.display(), error = %format!("{err:#}"), "document skipped");
            }
        }
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Doc {
        name: String,
    }

    #[test]
    fn documents_without_name_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), r#"{"Name": "Alpha"}"#).unwrap();
        std::fs::write(dir.path().join("b.json"), r#"{"Title": "Beta"}"#).unwrap();
        std::fs::write(dir.path().join("c.json"), r#"{"Name": 7}"#).unwrap();
        std::fs::write(dir.path().join("d.json"), "not json").unwrap();
        std::fs::write(dir.path().join("e.txt"), r#"{"Name": "Ignored"}"#).unwrap();

        let docs: Vec<Doc> = load_named_dir(dir.path(), "json").unwrap();
        let names: Vec<_> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["Alpha"]);
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let docs: Vec<Doc> = load_named_dir(&dir.path().join("nope"), "json").unwrap();
        assert!(docs.is_empty());
    }
}
