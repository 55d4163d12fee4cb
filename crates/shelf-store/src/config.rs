use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shelf_backend::{InMemoryBackend, LocalBackend};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::store::Store;

/// Which storage backend a store runs on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    #[default]
    Local,
}

/// Store configuration, usually read from a `shelf.toml` file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// Root directory of the local backend.
    pub root: PathBuf,
    /// Save sessions through a staging container and swap. When `false`,
    /// saves delete the session and rewrite it in place.
    pub staged_saves: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            root: PathBuf::from("./shelf-data"),
            staged_saves: true,
        }
    }
}

impl StoreConfig {
    /// An in-memory configuration, handy for tests and scratch stores.
    pub fn memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            ..Default::default()
        }
    }

    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Read a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "loaded store config");
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> StoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Build the configured backend and a store over it.
    pub fn open_store(&self) -> StoreResult<Store> {
        let store = match self.backend {
            BackendKind::Memory => Store::new(InMemoryBackend::new()),
            BackendKind::Local => Store::new(LocalBackend::open(&self.root)?),
        };
        debug!(
            backend = ?self.backend,
            root = %self.root.display(),
            staged_saves = self.staged_saves,
            "opened store"
        );
        Ok(store.with_staged_saves(self.staged_saves))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::User;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.backend, BackendKind::Local);
        assert_eq!(c.root, PathBuf::from("./shelf-data"));
        assert!(c.staged_saves);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let c = StoreConfig::from_toml_str("backend = \"memory\"").unwrap();
        assert_eq!(c.backend, BackendKind::Memory);
        assert!(c.staged_saves);

        let c = StoreConfig::from_toml_str("root = \"/var/shelf\"\nstaged_saves = false").unwrap();
        assert_eq!(c.backend, BackendKind::Local);
        assert_eq!(c.root, PathBuf::from("/var/shelf"));
        assert!(!c.staged_saves);
    }

    #[test]
    fn unknown_backend_is_a_config_error() {
        let err = StoreConfig::from_toml_str("backend = \"s3\"").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn toml_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shelf.toml");
        let config = StoreConfig {
            root: dir.path().join("data"),
            staged_saves: false,
            ..Default::default()
        };
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();
        assert_eq!(StoreConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StoreConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn open_store_for_each_backend() {
        let store = StoreConfig::memory().open_store().unwrap();
        store.add("s1", &User::new("u1", "Ann")).unwrap();
        assert_eq!(store.list_sessions().unwrap(), ["s1"]);

        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            root: dir.path().join("data"),
            ..Default::default()
        };
        let store = config.open_store().unwrap();
        store.add("s1", &User::new("u1", "Ann")).unwrap();
        assert!(dir.path().join("data/Sessions/s1/User/u1.bin").is_file());
    }
}
