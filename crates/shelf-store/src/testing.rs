//! Entity types shared by the store tests.

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use shelf_backend::{BackendError, BackendResult, InMemoryBackend, StorageBackend};
use shelf_codec::persist_record;

use crate::entity::Entity;
use crate::impl_entity;
use crate::store::Store;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub age: u32,
}

impl User {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            age: 0,
        }
    }
}

persist_record!(User { id, name, age });
impl_entity!(User, id);

/// Stored under a container name that differs from its record name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Order {
    pub number: u64,
    pub user_id: String,
    pub items: Vec<String>,
}

persist_record!(Order { number, user_id, items });

impl Entity for Order {
    fn entity_type() -> Cow<'static, str> {
        Cow::Borrowed("orders")
    }

    fn entity_id(&self) -> Option<String> {
        Some(self.number.to_string())
    }
}

/// A second Rust type claiming the `User` entity type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserAlias {
    pub id: String,
}

persist_record!(UserAlias as "User" { id });
impl_entity!(UserAlias, id);

pub fn memory_store() -> Store {
    Store::new(InMemoryBackend::new())
}

/// In-memory backend whose listings fail while its switch is on.
pub struct FlakyBackend {
    inner: InMemoryBackend,
    listing_down: Arc<AtomicBool>,
}

impl FlakyBackend {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let switch = Arc::new(AtomicBool::new(false));
        let backend = Self {
            inner: InMemoryBackend::new(),
            listing_down: Arc::clone(&switch),
        };
        (backend, switch)
    }

    fn check_listing(&self) -> BackendResult<()> {
        if self.listing_down.load(Ordering::SeqCst) {
            return Err(BackendError::Io(std::io::Error::other("connection reset")));
        }
        Ok(())
    }
}

impl StorageBackend for FlakyBackend {
    fn initialize(&mut self, location: &str) -> BackendResult<()> {
        self.inner.initialize(location)
    }
    fn save_blob(&self, key: &str, data: &[u8]) -> BackendResult<()> {
        self.inner.save_blob(key, data)
    }
    fn read_blob(&self, key: &str) -> BackendResult<Vec<u8>> {
        self.inner.read_blob(key)
    }
    fn delete_blob(&self, key: &str) -> BackendResult<()> {
        self.inner.delete_blob(key)
    }
    fn create_container(&self, key: &str) -> BackendResult<()> {
        self.inner.create_container(key)
    }
    fn delete_container(&self, key: &str) -> BackendResult<()> {
        self.inner.delete_container(key)
    }
    fn list_blobs(&self, container: &str) -> BackendResult<Vec<String>> {
        self.check_listing()?;
        self.inner.list_blobs(container)
    }
    fn list_containers(&self, container: &str) -> BackendResult<Vec<String>> {
        self.check_listing()?;
        self.inner.list_containers(container)
    }
    fn blob_exists(&self, key: &str) -> BackendResult<bool> {
        self.inner.blob_exists(key)
    }
    fn container_exists(&self, key: &str) -> BackendResult<bool> {
        self.inner.container_exists(key)
    }
}
