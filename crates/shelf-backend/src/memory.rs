use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{BackendError, BackendResult};
use crate::key;
use crate::traits::StorageBackend;

#[derive(Default)]
struct MemoryState {
    blobs: BTreeMap<String, Vec<u8>>,
    containers: BTreeSet<String>,
}

impl MemoryState {
    fn add_ancestors(&mut self, key: &str) {
        let mut container = key::parent(key);
        while !container.is_empty() && self.containers.insert(container.to_string()) {
            container = key::parent(container);
        }
    }

    fn remove_tree(&mut self, container: &str) {
        self.blobs.retain(|k, _| !key::is_within(container, k));
        self.containers
            .retain(|k| k != container && !key::is_within(container, k));
    }
}

/// In-memory, map-based backend.
///
/// Intended for tests and embedding. Blobs are held in a `BTreeMap` behind a
/// `RwLock`, so listings come back in key order. Data is cloned on read and
/// write.
pub struct InMemoryBackend {
    location: String,
    state: RwLock<MemoryState>,
}

impl InMemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self {
            location: String::new(),
            state: RwLock::new(MemoryState::default()),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.read_state().map_or(0, |state| state.blobs.len())
    }

    /// Returns `true` if no blobs are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every blob key, sorted.
    pub fn all_keys(&self) -> BackendResult<Vec<String>> {
        Ok(self.read_state()?.blobs.keys().cloned().collect())
    }

    fn read_state(&self) -> BackendResult<RwLockReadGuard<'_, MemoryState>> {
        self.state.read().map_err(|_| BackendError::LockPoisoned)
    }

    fn write_state(&self) -> BackendResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state.write().map_err(|_| BackendError::LockPoisoned)
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for InMemoryBackend {
    fn initialize(&mut self, location: &str) -> BackendResult<()> {
        self.location = location.to_string();
        Ok(())
    }

    fn save_blob(&self, key: &str, data: &[u8]) -> BackendResult<()> {
        key::validate_key(key)?;
        let mut state = self.write_state()?;
        state.add_ancestors(key);
        state.blobs.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn read_blob(&self, key: &str) -> BackendResult<Vec<u8>> {
        key::validate_key(key)?;
        self.read_state()?
            .blobs
            .get(key)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(key.to_string()))
    }

    fn delete_blob(&self, key: &str) -> BackendResult<()> {
        key::validate_key(key)?;
        self.write_state()?.blobs.remove(key);
        Ok(())
    }

    fn create_container(&self, key: &str) -> BackendResult<()> {
        key::validate_container(key)?;
        if key.is_empty() {
            return Ok(());
        }
        let mut state = self.write_state()?;
        state.add_ancestors(key);
        state.containers.insert(key.to_string());
        Ok(())
    }

    fn delete_container(&self, key: &str) -> BackendResult<()> {
        key::validate_container(key)?;
        self.write_state()?.remove_tree(key);
        Ok(())
    }

    fn list_blobs(&self, container: &str) -> BackendResult<Vec<String>> {
        key::validate_container(container)?;
        let state = self.read_state()?;
        Ok(state
            .blobs
            .keys()
            .filter(|k| key::parent(k) == container)
            .cloned()
            .collect())
    }

    fn list_containers(&self, container: &str) -> BackendResult<Vec<String>> {
        key::validate_container(container)?;
        let state = self.read_state()?;
        Ok(state
            .containers
            .iter()
            .filter(|k| key::parent(k) == container)
            .cloned()
            .collect())
    }

    fn blob_exists(&self, key: &str) -> BackendResult<bool> {
        key::validate_key(key)?;
        Ok(self.read_state()?.blobs.contains_key(key))
    }

    fn container_exists(&self, key: &str) -> BackendResult<bool> {
        key::validate_container(key)?;
        Ok(key.is_empty() || self.read_state()?.containers.contains(key))
    }

    /// Swaps under a single write lock, so readers never see a partial state.
    fn swap_container(&self, staging: &str, target: &str) -> BackendResult<()> {
        key::validate_key(staging)?;
        key::validate_key(target)?;
        let mut state = self.write_state()?;
        if !state.containers.contains(staging) {
            return Err(BackendError::NotFound(staging.to_string()));
        }
        state.remove_tree(target);

        let moved_blobs: Vec<(String, Vec<u8>)> = state
            .blobs
            .iter()
            .filter(|(k, _)| key::is_within(staging, k))
            .map(|(k, v)| (key::rebase(k, staging, target), v.clone()))
            .collect();
        let moved_containers: Vec<String> = state
            .containers
            .iter()
            .filter(|k| key::is_within(staging, k))
            .map(|k| key::rebase(k, staging, target))
            .collect();

        state.remove_tree(staging);
        state.add_ancestors(target);
        state.containers.insert(target.to_string());
        state.containers.extend(moved_containers);
        state.blobs.extend(moved_blobs);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("location", &self.location)
            .field("blob_count", &self.len())
            .finish()
    }
}
