use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{BackendError, BackendResult};
use crate::key;
use crate::traits::StorageBackend;

/// Prefix of in-flight temporary files and directories; hidden from listings.
const TEMP_PREFIX: &str = key::RESERVED_PREFIX;

/// Filesystem backend: containers are directories and blobs are files.
///
/// Blob writes go to a temporary file in the target directory which is then
/// renamed over the destination, so a reader never sees a half-written blob.
/// Container swaps use directory renames.
#[derive(Debug, Default)]
pub struct LocalBackend {
    root: Option<PathBuf>,
}

impl LocalBackend {
    /// Create an uninitialized backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> BackendResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        debug!(root = %root.display(), "opened local backend");
        Ok(Self {
            root: Some(root.to_path_buf()),
        })
    }

    /// Root directory, if initialized.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn path(&self, key: &str) -> BackendResult<PathBuf> {
        let mut path = self.root.clone().ok_or(BackendError::NotInitialized)?;
        if !key.is_empty() {
            path.extend(key.split('/'));
        }
        Ok(path)
    }

    fn list(&self, container: &str, want_dirs: bool) -> BackendResult<Vec<String>> {
        key::validate_container(container)?;
        let dir = self.path(container)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() != want_dirs {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!(path = %entry.path().display(), "skipping non UTF-8 entry");
                continue;
            };
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }
            keys.push(key::join(container, &name));
        }
        keys.sort();
        Ok(keys)
    }
}

impl StorageBackend for LocalBackend {
    fn initialize(&mut self, location: &str) -> BackendResult<()> {
        fs::create_dir_all(location)?;
        self.root = Some(PathBuf::from(location));
        Ok(())
    }

    fn save_blob(&self, key: &str, data: &[u8]) -> BackendResult<()> {
        key::validate_key(key)?;
        let path = self.path(key)?;
        let dir = path.parent().ok_or(BackendError::NotInitialized)?;
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        debug!(key, bytes = data.len(), "saved blob");
        Ok(())
    }

    fn read_blob(&self, key: &str) -> BackendResult<Vec<u8>> {
        key::validate_key(key)?;
        match fs::read(self.path(key)?) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(BackendError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete_blob(&self, key: &str) -> BackendResult<()> {
        key::validate_key(key)?;
        match fs::remove_file(self.path(key)?) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn create_container(&self, key: &str) -> BackendResult<()> {
        key::validate_container(key)?;
        fs::create_dir_all(self.path(key)?)?;
        Ok(())
    }

    fn delete_container(&self, key: &str) -> BackendResult<()> {
        key::validate_container(key)?;
        match fs::remove_dir_all(self.path(key)?) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn list_blobs(&self, container: &str) -> BackendResult<Vec<String>> {
        self.list(container, false)
    }

    fn list_containers(&self, container: &str) -> BackendResult<Vec<String>> {
        self.list(container, true)
    }

    fn blob_exists(&self, key: &str) -> BackendResult<bool> {
        key::validate_key(key)?;
        Ok(self.path(key)?.is_file())
    }

    fn container_exists(&self, key: &str) -> BackendResult<bool> {
        key::validate_container(key)?;
        Ok(self.path(key)?.is_dir())
    }

    /// Moves `target` aside, renames `staging` into place, then removes the
    /// old copy. If the second rename fails the old copy is restored.
    fn swap_container(&self, staging: &str, target: &str) -> BackendResult<()> {
        key::validate_key(staging)?;
        key::validate_key(target)?;
        let staging_path = self.path(staging)?;
        if !staging_path.is_dir() {
            return Err(BackendError::NotFound(staging.to_string()));
        }
        let target_path = self.path(target)?;
        let parent = target_path.parent().ok_or(BackendError::NotInitialized)?;
        fs::create_dir_all(parent)?;

        let backup = if target_path.exists() {
            let backup = parent.join(format!("{TEMP_PREFIX}old-{}", key::file_name(target)));
            if backup.exists() {
                fs::remove_dir_all(&backup)?;
            }
            fs::rename(&target_path, &backup)?;
            Some(backup)
        } else {
            None
        };

        if let Err(e) = fs::rename(&staging_path, &target_path) {
            if let Some(backup) = &backup {
                if let Err(restore) = fs::rename(backup, &target_path) {
                    warn!(
                        container = target,
                        error = %restore,
                        "failed to restore container after swap failure"
                    );
                }
            }
            return Err(e.into());
        }

        if let Some(backup) = backup {
            if let Err(e) = fs::remove_dir_all(&backup) {
                warn!(path = %backup.display(), error = %e, "failed to remove replaced container");
            }
        }
        debug!(staging, container = target, "swapped container");
        Ok(())
    }
}
