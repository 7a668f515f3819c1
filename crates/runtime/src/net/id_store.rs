//! Small persistent key/value store for the local net identity.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::info;

use super::error::NetError;
use super::wire::NetId;

const FILE_NAME: &str = "net_id.json";
const NET_ID_KEY: &str = "net_id";

pub struct NetIdStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl NetIdStore {
    /// Platform config directory, falling back to the working directory.
    pub fn default_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "haunts")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("./haunts_config"))
    }

    pub fn open(dir: impl AsRef<Path>) -> Result<Self, NetError> {
        let path = dir.as_ref().join(FILE_NAME);
        let values = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| NetError::Store(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(NetError::Store(format!("{}: {e}", path.display()))),
        };
        Ok(Self { path, values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), NetError> {
        self.values.insert(key.to_owned(), value.into());
        self.flush()
    }

    /// Stored identity, generating and persisting one on first use.
    pub fn net_id(&mut self) -> Result<NetId, NetError> {
        if let Some(raw) = self.get(NET_ID_KEY)
            && let Ok(id) = u64::from_str_radix(raw, 16)
        {
            return Ok(NetId(id));
        }
        let id = NetId(rand::thread_rng().r#gen());
        self.set(NET_ID_KEY, id.to_string())?;
        info!(target: "runtime::net", %id, "generated net id");
        Ok(id)
    }

    fn flush(&self) -> Result<(), NetError> {
        let store_err = |e: &dyn std::fmt::Display| {
            NetError::Store(format!("{}: {e}", self.path.display()))
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| store_err(&e))?;
        }
        let text = serde_json::to_string_pretty(&self.values).map_err(|e| store_err(&e))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text).map_err(|e| store_err(&e))?;
        fs::rename(&tmp, &self.path).map_err(|e| store_err(&e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_id_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let first = NetIdStore::open(dir.path()).unwrap().net_id().unwrap();
        let mut reopened = NetIdStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get("net_id"), Some(first.to_string().as_str()));
        assert_eq!(reopened.net_id().unwrap(), first);
    }

    #[test]
    fn corrupt_store_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FILE_NAME), "{not json").unwrap();
        assert!(matches!(NetIdStore::open(dir.path()), Err(NetError::Store(_))));
    }
}
