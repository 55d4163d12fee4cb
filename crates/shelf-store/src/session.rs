//! Per-session entity cache.
//!
//! A [`Session`] holds one collection per entity type, materialized from the
//! store on first access and reused until the session is dropped. Writes go
//! through the store first and are then mirrored into the cache. Writes made
//! by other sessions or processes after materialization are not seen by
//! [`Session::collection`]; [`Session::query`] always re-reads storage.

use std::collections::BTreeMap;

use tracing::debug;

use crate::collection::{decode_records, identity_of, CachedCollection, RawRecord};
use crate::entity::Entity;
use crate::error::{StoreError, StoreResult};
use crate::store::Store;

/// Cached view of one session. Not `Send`: collections may hold `Rc` graphs.
pub struct Session<'s> {
    id: String,
    store: &'s Store,
    collections: BTreeMap<String, CachedCollection>,
}

impl<'s> Session<'s> {
    pub(crate) fn new(id: &str, store: &'s Store) -> Self {
        Self {
            id: id.to_string(),
            store,
            collections: BTreeMap::new(),
        }
    }

    pub(crate) fn insert_collection(&mut self, entity_type: String, collection: CachedCollection) {
        self.collections.insert(entity_type, collection);
    }

    /// Encode every cached collection, failing before anything is written.
    pub(crate) fn snapshot(&self) -> StoreResult<Vec<(String, Vec<RawRecord>)>> {
        self.collections
            .iter()
            .map(|(entity_type, collection)| {
                Ok((entity_type.clone(), collection.encode_all(&self.id)?))
            })
            .collect()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn store(&self) -> &'s Store {
        self.store
    }

    // ---- Writes ----

    /// Store `entity` and cache it, replacing a cached entity with the same
    /// identity.
    pub fn add<T: Entity>(&mut self, entity: T) -> StoreResult<()> {
        let id = identity_of(&entity)?;
        self.store.add(&self.id, &entity)?;
        self.mirror_write::<T>(|items| {
            match items
                .iter()
                .position(|cached| cached.entity_id().as_deref() == Some(id.as_str()))
            {
                Some(index) => items[index] = entity,
                None => items.push(entity),
            }
        })
    }

    /// Update matching entities in storage, then in the cache.
    ///
    /// The cache is updated even when the store reports
    /// [`StoreError::PartialFailure`]; that error is returned afterwards.
    /// Any other error leaves the cache untouched.
    pub fn update<T, P, M>(&mut self, predicate: P, mut mutator: M) -> StoreResult<usize>
    where
        T: Entity,
        P: Fn(&T) -> bool,
        M: FnMut(&mut T),
    {
        let result = self.store.update::<T, _, _>(&self.id, &predicate, &mut mutator);
        if !reached_storage(&result) {
            return result;
        }
        self.mirror_write::<T>(|items| {
            for entity in items.iter_mut() {
                if predicate(entity) {
                    mutator(entity);
                }
            }
        })?;
        result
    }

    /// Delete matching entities from storage, then from the cache.
    ///
    /// Failures are handled as in [`Session::update`].
    pub fn delete<T, P>(&mut self, predicate: P) -> StoreResult<usize>
    where
        T: Entity,
        P: Fn(&T) -> bool,
    {
        let result = self.store.delete::<T, _>(&self.id, &predicate);
        if !reached_storage(&result) {
            return result;
        }
        self.mirror_write::<T>(|items| items.retain(|entity| !predicate(entity)))?;
        result
    }

    // ---- Reads ----

    /// Matching entities as stored now.
    ///
    /// Results not yet in the cache are added to it; cached entities are
    /// left as they are.
    pub fn query<T, P>(&mut self, predicate: P) -> StoreResult<Vec<T>>
    where
        T: Entity,
        P: Fn(&T) -> bool,
    {
        if !self.collections.contains_key(T::entity_type().as_ref()) {
            let items = self.typed::<T>()?;
            return Ok(items.iter().filter(|e| predicate(*e)).cloned().collect());
        }

        let found = self.store.query::<T, _>(&self.id, &predicate)?;
        let items = self.typed::<T>()?;
        for entity in &found {
            let id = entity.entity_id();
            if !items.iter().any(|cached| cached.entity_id() == id) {
                items.push(entity.clone());
            }
        }
        Ok(found)
    }

    /// The cached collection of `T`, materialized on first access.
    pub fn collection<T: Entity>(&mut self) -> StoreResult<&[T]> {
        Ok(self.typed::<T>()?.as_slice())
    }

    /// Mutable access to the cached collection. Changes reach storage only
    /// through [`Session::save`].
    pub fn collection_mut<T: Entity>(&mut self) -> StoreResult<&mut Vec<T>> {
        self.typed::<T>()
    }

    /// Replace the persisted session with the cache content.
    pub fn save(&self) -> StoreResult<()> {
        self.store.save_session(self)
    }

    /// Entity type names present in the cache, sorted.
    pub fn cached_types(&self) -> Vec<&str> {
        self.collections.keys().map(String::as_str).collect()
    }

    /// Number of cached entities of a type, if that type is cached.
    pub fn cached_len(&self, entity_type: &str) -> Option<usize> {
        self.collections.get(entity_type).map(CachedCollection::len)
    }

    /// Bring the cache in line with a write that already reached storage.
    ///
    /// A decoded collection gets `apply`. A type that is not cached yet, or
    /// only held as raw records, is re-read from storage without decoding,
    /// so an unreadable record of the type cannot fail the write.
    fn mirror_write<T: Entity>(&mut self, apply: impl FnOnce(&mut Vec<T>)) -> StoreResult<()> {
        let entity_type = T::entity_type();
        let decoded = matches!(
            self.collections.get(entity_type.as_ref()),
            Some(CachedCollection::Typed(_))
        );
        if decoded {
            apply(self.typed::<T>()?);
        } else {
            let records = self.store.raw_records(&self.id, &entity_type)?;
            debug!(
                session = %self.id,
                entity_type = %entity_type,
                count = records.len(),
                "refreshed raw collection"
            );
            self.collections
                .insert(entity_type.to_string(), CachedCollection::Raw(records));
        }
        Ok(())
    }

    fn typed<T: Entity>(&mut self) -> StoreResult<&mut Vec<T>> {
        let entity_type = T::entity_type();
        let loaded = match self.collections.get(entity_type.as_ref()) {
            None => Some(self.store.query::<T, _>(&self.id, |_| true)?),
            Some(CachedCollection::Raw(records)) => Some(decode_records::<T>(&self.id, records)?),
            Some(CachedCollection::Typed(_)) => None,
        };
        if let Some(items) = loaded {
            debug!(
                session = %self.id,
                entity_type = %entity_type,
                count = items.len(),
                "materialized collection"
            );
            self.collections.insert(
                entity_type.to_string(),
                CachedCollection::Typed(Box::new(items)),
            );
        }

        match self.collections.get_mut(entity_type.as_ref()) {
            Some(CachedCollection::Typed(items)) => items
                .as_any_mut()
                .downcast_mut::<Vec<T>>()
                .ok_or_else(|| StoreError::TypeConflict {
                    type_name: entity_type.to_string(),
                }),
            _ => Err(StoreError::TypeConflict {
                type_name: entity_type.to_string(),
            }),
        }
    }
}

/// Whether a bulk write got as far as storage, fully or in part.
fn reached_storage(result: &StoreResult<usize>) -> bool {
    matches!(result, Ok(_) | Err(StoreError::PartialFailure { .. }))
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("collections", &self.collections)
            .finish()
    }
}
