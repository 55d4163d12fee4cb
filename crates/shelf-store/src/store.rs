use shelf_backend::{key, StorageBackend};
use tracing::{debug, warn};

use crate::collection::{
    decode_entity, encode_entity, identity_of, CachedCollection, RawRecord, Registry,
};
use crate::entity::Entity;
use crate::error::{StoreError, StoreResult};
use crate::keys;
use crate::session::Session;

/// Session-scoped document store over a [`StorageBackend`].
///
/// Every entity is one blob at `Sessions/{session}/{type}/{id}.bin`.
/// Queries scan all blobs of a type; there are no indexes.
pub struct Store {
    backend: Box<dyn StorageBackend>,
    registry: Registry,
    staged_saves: bool,
}

impl Store {
    /// Create a store over an initialized backend.
    pub fn new<B: StorageBackend + 'static>(backend: B) -> Self {
        Self::from_boxed(Box::new(backend))
    }

    pub fn from_boxed(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend,
            registry: Registry::default(),
            staged_saves: true,
        }
    }

    /// Initialize `backend` at `location`, then create a store over it.
    pub fn open<B: StorageBackend + 'static>(mut backend: B, location: &str) -> StoreResult<Self> {
        backend.initialize(location)?;
        Ok(Self::new(backend))
    }

    /// Choose between staged (swap-based) and delete-then-rewrite saves.
    pub fn with_staged_saves(mut self, staged: bool) -> Self {
        self.staged_saves = staged;
        self
    }

    /// Register `T` so [`Store::load_session`] decodes its records eagerly.
    pub fn register<T: Entity>(&mut self) -> StoreResult<()> {
        self.registry.register::<T>()
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    // ---- Entity operations ----

    /// Store `entity`, silently replacing any record with the same identity.
    pub fn add<T: Entity>(&self, session_id: &str, entity: &T) -> StoreResult<()> {
        keys::validate_session_id(session_id)?;
        let id = identity_of(entity)?;
        let key = keys::record_key(session_id, &T::entity_type(), &id);
        let bytes = encode_entity(&key, entity)?;
        self.backend.save_blob(&key, &bytes)?;
        debug!(session = session_id, key = %key, bytes = bytes.len(), "added entity");
        Ok(())
    }

    /// All entities of type `T` matching `predicate`, in listing order.
    ///
    /// A type with nothing stored yields an empty list. Any record that
    /// fails to decode fails the whole query.
    pub fn query<T, P>(&self, session_id: &str, predicate: P) -> StoreResult<Vec<T>>
    where
        T: Entity,
        P: Fn(&T) -> bool,
    {
        keys::validate_session_id(session_id)?;
        let mut matches = Vec::new();
        for key in self.record_keys::<T>(session_id)? {
            let entity = self.read_entity::<T>(&key)?;
            if predicate(&entity) {
                matches.push(entity);
            }
        }
        debug!(
            session = session_id,
            entity_type = %T::entity_type(),
            count = matches.len(),
            "query"
        );
        Ok(matches)
    }

    /// Apply `mutator` to every matching entity and write each back under
    /// its original key.
    ///
    /// Records that fail to read, decode or write are skipped; once the
    /// scan finishes they are reported together as
    /// [`StoreError::PartialFailure`]. Returns the number updated.
    pub fn update<T, P, M>(
        &self,
        session_id: &str,
        predicate: P,
        mut mutator: M,
    ) -> StoreResult<usize>
    where
        T: Entity,
        P: Fn(&T) -> bool,
        M: FnMut(&mut T),
    {
        keys::validate_session_id(session_id)?;
        let mut succeeded = 0;
        let mut failures = Vec::new();
        for key in self.record_keys::<T>(session_id)? {
            let step = self.read_entity::<T>(&key).and_then(|mut entity| {
                if !predicate(&entity) {
                    return Ok(false);
                }
                mutator(&mut entity);
                let bytes = encode_entity(&key, &entity)?;
                self.backend.save_blob(&key, &bytes)?;
                Ok(true)
            });
            match step {
                Ok(true) => succeeded += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "update skipped record");
                    failures.push((key, e));
                }
            }
        }
        debug!(
            session = session_id,
            entity_type = %T::entity_type(),
            succeeded,
            failed = failures.len(),
            "update"
        );
        finish_bulk("update", succeeded, failures)
    }

    /// Delete every matching entity. Same failure reporting as
    /// [`Store::update`]. Returns the number deleted.
    pub fn delete<T, P>(&self, session_id: &str, predicate: P) -> StoreResult<usize>
    where
        T: Entity,
        P: Fn(&T) -> bool,
    {
        keys::validate_session_id(session_id)?;
        let mut succeeded = 0;
        let mut failures = Vec::new();
        for key in self.record_keys::<T>(session_id)? {
            let step = self.read_entity::<T>(&key).and_then(|entity| {
                if !predicate(&entity) {
                    return Ok(false);
                }
                self.backend.delete_blob(&key)?;
                Ok(true)
            });
            match step {
                Ok(true) => succeeded += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "delete skipped record");
                    failures.push((key, e));
                }
            }
        }
        debug!(
            session = session_id,
            entity_type = %T::entity_type(),
            succeeded,
            failed = failures.len(),
            "delete"
        );
        finish_bulk("delete", succeeded, failures)
    }

    /// Read one entity by identity.
    pub fn get<T: Entity>(&self, session_id: &str, entity_id: &str) -> StoreResult<T> {
        keys::validate_session_id(session_id)?;
        keys::validate_entity(&T::entity_type(), entity_id)?;
        self.read_entity(&keys::record_key(session_id, &T::entity_type(), entity_id))
    }

    /// Encoded bytes of one record, for types not known at compile time.
    pub fn read_raw(
        &self,
        session_id: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> StoreResult<Vec<u8>> {
        keys::validate_session_id(session_id)?;
        keys::validate_entity(entity_type, entity_id)?;
        self.read_blob(&keys::record_key(session_id, entity_type, entity_id))
    }

    /// Delete one record by type name and identity.
    pub fn delete_raw(
        &self,
        session_id: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> StoreResult<()> {
        keys::validate_session_id(session_id)?;
        keys::validate_entity(entity_type, entity_id)?;
        let key = keys::record_key(session_id, entity_type, entity_id);
        if !self.backend.blob_exists(&key)? {
            return Err(StoreError::NotFound { key });
        }
        self.backend.delete_blob(&key)?;
        Ok(())
    }

    /// Identities stored for a type, in listing order.
    pub fn list_ids(&self, session_id: &str, entity_type: &str) -> StoreResult<Vec<String>> {
        keys::validate_session_id(session_id)?;
        let container = keys::type_container(session_id, entity_type);
        key::validate_container(&container)?;
        Ok(self
            .backend
            .list_blobs(&container)?
            .iter()
            .filter_map(|k| keys::record_id(k))
            .map(str::to_string)
            .collect())
    }

    // ---- Session operations ----

    /// Return the session, creating it in storage if it does not exist.
    /// The returned cache is empty.
    pub fn session(&self, session_id: &str) -> StoreResult<Session<'_>> {
        keys::validate_session_id(session_id)?;
        let container = keys::session_container(session_id);
        if !self.backend.container_exists(&container)? {
            self.backend.create_container(&container)?;
            debug!(session = session_id, "created session");
        }
        Ok(Session::new(session_id, self))
    }

    /// Load a persisted session with every stored type in its cache.
    ///
    /// Types registered with [`Store::register`] are decoded now. Other
    /// types are held as raw bytes until first typed access, so saving the
    /// session keeps them.
    pub fn load_session(&self, session_id: &str) -> StoreResult<Session<'_>> {
        if !self.session_exists(session_id)? {
            return Err(StoreError::SessionNotFound(session_id.to_string()));
        }
        let mut session = Session::new(session_id, self);
        for container in self.backend.list_containers(&keys::session_container(session_id))? {
            let entity_type = key::file_name(&container).to_string();
            let records = self.raw_records(session_id, &entity_type)?;
            let collection = match self.registry.loader(&entity_type) {
                Some(load) => CachedCollection::Typed(load(session_id, &records)?),
                None => {
                    warn!(
                        session = session_id,
                        entity_type = %entity_type,
                        count = records.len(),
                        "no registered type, keeping records undecoded"
                    );
                    CachedCollection::Raw(records)
                }
            };
            session.insert_collection(entity_type, collection);
        }
        debug!(session = session_id, types = session.cached_types().len(), "loaded session");
        Ok(session)
    }

    /// Replace the persisted session with the content of its cache.
    ///
    /// Only types present in the cache are written; persisted types that
    /// were never loaded into it are removed. With staged saves (the
    /// default) the new content is written to a staging container and
    /// swapped into place, so a failed save leaves the old content. Without
    /// them the session is deleted and rewritten, which is not atomic.
    pub fn save_session(&self, session: &Session<'_>) -> StoreResult<()> {
        let session_id = session.id();
        let snapshot = session.snapshot()?;
        let target = keys::session_container(session_id);

        if !self.staged_saves {
            self.backend.delete_container(&target)?;
            self.write_snapshot(&target, &snapshot)?;
            debug!(session = session_id, types = snapshot.len(), "saved session (rewrite)");
            return Ok(());
        }

        let staging = keys::staging_container(session_id);
        let result = self
            .write_snapshot(&staging, &snapshot)
            .and_then(|()| Ok(self.backend.swap_container(&staging, &target)?));
        if let Err(e) = &result {
            warn!(session = session_id, error = %e, "staged save failed");
            if let Err(cleanup) = self.backend.delete_container(&staging) {
                warn!(staging = %staging, error = %cleanup, "failed to remove staging container");
            }
        } else {
            debug!(session = session_id, types = snapshot.len(), "saved session");
        }
        result
    }

    pub fn list_sessions(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .backend
            .list_containers(keys::SESSIONS_ROOT)?
            .iter()
            .map(|c| key::file_name(c).to_string())
            .collect())
    }

    pub fn session_exists(&self, session_id: &str) -> StoreResult<bool> {
        keys::validate_session_id(session_id)?;
        Ok(self
            .backend
            .container_exists(&keys::session_container(session_id))?)
    }

    /// Entity type names stored in a session.
    pub fn list_entity_types(&self, session_id: &str) -> StoreResult<Vec<String>> {
        if !self.session_exists(session_id)? {
            return Err(StoreError::SessionNotFound(session_id.to_string()));
        }
        Ok(self
            .backend
            .list_containers(&keys::session_container(session_id))?
            .iter()
            .map(|c| key::file_name(c).to_string())
            .collect())
    }

    /// Delete a session and everything stored in it.
    pub fn drop_session(&self, session_id: &str) -> StoreResult<()> {
        if !self.session_exists(session_id)? {
            return Err(StoreError::SessionNotFound(session_id.to_string()));
        }
        self.backend
            .delete_container(&keys::session_container(session_id))?;
        debug!(session = session_id, "dropped session");
        Ok(())
    }

    // ---- Internal ----

    /// Undecoded records of one type. Non-record blobs are skipped.
    pub(crate) fn raw_records(
        &self,
        session_id: &str,
        entity_type: &str,
    ) -> StoreResult<Vec<RawRecord>> {
        let container = keys::type_container(session_id, entity_type);
        if !self.backend.container_exists(&container)? {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for blob in self.backend.list_blobs(&container)? {
            let Some(id) = keys::record_id(&blob) else {
                warn!(key = %blob, "ignoring non-record blob");
                continue;
            };
            records.push(RawRecord {
                id: id.to_string(),
                bytes: self.read_blob(&blob)?,
            });
        }
        Ok(records)
    }

    fn record_keys<T: Entity>(&self, session_id: &str) -> StoreResult<Vec<String>> {
        let entity_type = T::entity_type();
        let container = keys::type_container(session_id, &entity_type);
        key::validate_container(&container).map_err(|e| StoreError::InvalidEntity {
            entity_type: entity_type.to_string(),
            reason: e.to_string(),
        })?;
        if !self.backend.container_exists(&container)? {
            return Ok(Vec::new());
        }
        Ok(self
            .backend
            .list_blobs(&container)?
            .into_iter()
            .filter(|k| keys::record_id(k).is_some())
            .collect())
    }

    fn read_blob(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.backend.read_blob(key).map_err(|e| {
            if e.is_not_found() {
                StoreError::NotFound {
                    key: key.to_string(),
                }
            } else {
                e.into()
            }
        })
    }

    fn read_entity<T: Entity>(&self, key: &str) -> StoreResult<T> {
        let bytes = self.read_blob(key)?;
        decode_entity(key, &bytes)
    }

    fn write_snapshot(
        &self,
        container: &str,
        snapshot: &[(String, Vec<RawRecord>)],
    ) -> StoreResult<()> {
        self.backend.create_container(container)?;
        for (entity_type, records) in snapshot {
            self.backend
                .create_container(&key::join(container, entity_type))?;
            for record in records {
                let key = keys::record_key_in(container, entity_type, &record.id);
                self.backend.save_blob(&key, &record.bytes)?;
            }
        }
        Ok(())
    }
}

fn finish_bulk(
    operation: &'static str,
    succeeded: usize,
    failures: Vec<(String, StoreError)>,
) -> StoreResult<usize> {
    if failures.is_empty() {
        Ok(succeeded)
    } else {
        Err(StoreError::PartialFailure {
            operation,
            succeeded,
            failures,
        })
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("registered_types", &self.registry.len())
            .field("staged_saves", &self.staged_saves)
            .finish()
    }
}
