use tracing::debug;

use crate::error::BackendResult;
use crate::key;

/// Hierarchical blob storage addressed by `/`-separated keys.
///
/// All implementations must satisfy these invariants:
/// - Saving a blob implicitly creates every container above it.
/// - Reading a missing blob fails with `NotFound`; deleting one is a no-op.
/// - Listing an absent container yields an empty list.
/// - Listings return full keys of direct children in lexicographic order.
/// - All I/O errors are propagated, never silently ignored.
///
/// Implementations synchronise internally only as far as needed to keep
/// their own state consistent. Callers that write the same keys from several
/// threads get no ordering guarantees.
pub trait StorageBackend: Send + Sync {
    /// Point the backend at `location` (a directory, bucket, ...).
    fn initialize(&mut self, location: &str) -> BackendResult<()>;

    /// Write `data` at `key`, replacing any existing blob.
    fn save_blob(&self, key: &str, data: &[u8]) -> BackendResult<()>;

    /// Read the blob at `key`.
    fn read_blob(&self, key: &str) -> BackendResult<Vec<u8>>;

    /// Delete the blob at `key` if it exists.
    fn delete_blob(&self, key: &str) -> BackendResult<()>;

    /// Create a container and its ancestors.
    fn create_container(&self, key: &str) -> BackendResult<()>;

    /// Delete a container with everything under it, if it exists.
    fn delete_container(&self, key: &str) -> BackendResult<()>;

    /// Full keys of the blobs directly inside `container`.
    fn list_blobs(&self, container: &str) -> BackendResult<Vec<String>>;

    /// Full keys of the containers directly inside `container`.
    fn list_containers(&self, container: &str) -> BackendResult<Vec<String>>;

    fn blob_exists(&self, key: &str) -> BackendResult<bool>;

    fn container_exists(&self, key: &str) -> BackendResult<bool>;

    /// Replace `target` with the content of `staging`, removing `staging`.
    ///
    /// The default implementation deletes `target` and copies blob by blob.
    /// It is **not atomic**: a failure part way leaves `target` partially
    /// written. Backends that can rename containers should override it.
    fn swap_container(&self, staging: &str, target: &str) -> BackendResult<()> {
        debug!(staging, container = target, "swapping container by copy");
        self.delete_container(target)?;
        copy_container(self, staging, target)?;
        self.delete_container(staging)
    }
}

/// Recursively copy every blob under `from` to the same relative key under `to`.
pub fn copy_container<B: StorageBackend + ?Sized>(
    backend: &B,
    from: &str,
    to: &str,
) -> BackendResult<()> {
    backend.create_container(to)?;
    for blob in backend.list_blobs(from)? {
        let data = backend.read_blob(&blob)?;
        backend.save_blob(&key::rebase(&blob, from, to), &data)?;
    }
    for child in backend.list_containers(from)? {
        copy_container(backend, &child, &key::rebase(&child, from, to))?;
    }
    Ok(())
}
