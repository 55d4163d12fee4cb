//! Type-erased entity collections held by a session cache.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use shelf_codec::WarningKind;
use tracing::{debug, warn};

use crate::entity::Entity;
use crate::error::{StoreError, StoreResult};
use crate::keys;

/// Encoded bytes of one stored record, not yet decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RawRecord {
    pub id: String,
    pub bytes: Vec<u8>,
}

/// A typed collection seen through a `dyn` pointer.
pub(crate) trait ErasedCollection {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Encode every entity as `(id, bytes)`.
    fn encode_all(&self, session_id: &str) -> StoreResult<Vec<RawRecord>>;

    fn len(&self) -> usize;
}

impl<T: Entity> ErasedCollection for Vec<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn encode_all(&self, session_id: &str) -> StoreResult<Vec<RawRecord>> {
        self.iter()
            .map(|entity| {
                let id = identity_of(entity)?;
                let key = keys::record_key(session_id, &T::entity_type(), &id);
                let bytes = encode_entity(&key, entity)?;
                Ok(RawRecord { id, bytes })
            })
            .collect()
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

/// One entity type's slot in a session cache.
pub(crate) enum CachedCollection {
    /// Loaded from storage for a type with no registered Rust type yet.
    Raw(Vec<RawRecord>),
    /// Decoded `Vec<T>`.
    Typed(Box<dyn ErasedCollection>),
}

impl CachedCollection {
    pub fn len(&self) -> usize {
        match self {
            Self::Raw(records) => records.len(),
            Self::Typed(items) => items.len(),
        }
    }

    pub fn encode_all(&self, session_id: &str) -> StoreResult<Vec<RawRecord>> {
        match self {
            Self::Raw(records) => Ok(records.clone()),
            Self::Typed(items) => items.encode_all(session_id),
        }
    }
}

impl std::fmt::Debug for CachedCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw(records) => f.debug_tuple("Raw").field(&records.len()).finish(),
            Self::Typed(items) => f.debug_tuple("Typed").field(&items.len()).finish(),
        }
    }
}

/// Decodes a type's raw records into a typed collection.
pub(crate) type LoadFn = fn(&str, &[RawRecord]) -> StoreResult<Box<dyn ErasedCollection>>;

/// Rust types registered for eager decoding, by entity type name.
#[derive(Default)]
pub(crate) struct Registry {
    types: HashMap<String, (TypeId, LoadFn)>,
}

impl Registry {
    pub fn register<T: Entity>(&mut self) -> StoreResult<()> {
        let type_name = T::entity_type().into_owned();
        let type_id = TypeId::of::<T>();
        match self.types.get(&type_name) {
            Some((existing, _)) if *existing != type_id => {
                Err(StoreError::TypeConflict { type_name })
            }
            Some(_) => Ok(()),
            None => {
                debug!(entity_type = %type_name, "registered entity type");
                self.types.insert(type_name, (type_id, load_typed::<T>));
                Ok(())
            }
        }
    }

    pub fn loader(&self, type_name: &str) -> Option<LoadFn> {
        self.types.get(type_name).map(|(_, load)| *load)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }
}

fn load_typed<T: Entity>(
    session_id: &str,
    records: &[RawRecord],
) -> StoreResult<Box<dyn ErasedCollection>> {
    Ok(Box::new(decode_records::<T>(session_id, records)?))
}

/// Decode raw records of one type.
pub(crate) fn decode_records<T: Entity>(
    session_id: &str,
    records: &[RawRecord],
) -> StoreResult<Vec<T>> {
    let entity_type = T::entity_type();
    records
        .iter()
        .map(|record| {
            let key = keys::record_key(session_id, &entity_type, &record.id);
            decode_entity(&key, &record.bytes)
        })
        .collect()
}

pub(crate) fn identity_of<T: Entity>(entity: &T) -> StoreResult<String> {
    let entity_type = T::entity_type();
    let id = entity.entity_id().ok_or_else(|| StoreError::InvalidEntity {
        entity_type: entity_type.to_string(),
        reason: "identity attribute is absent".into(),
    })?;
    keys::validate_entity(&entity_type, &id)?;
    Ok(id)
}

/// Encode one entity, logging swallowed field failures.
pub(crate) fn encode_entity<T: Entity>(key: &str, entity: &T) -> StoreResult<Vec<u8>> {
    let encoded = shelf_codec::encode(entity).map_err(|source| StoreError::Codec {
        key: key.to_string(),
        source,
    })?;
    for warning in &encoded.warnings {
        warn!(key, warning = %warning, "field written as null");
    }
    Ok(encoded.bytes)
}

/// Decode one entity, logging any degradation.
pub(crate) fn decode_entity<T: Entity>(key: &str, bytes: &[u8]) -> StoreResult<T> {
    let decoded = shelf_codec::decode::<T>(bytes).map_err(|source| StoreError::Codec {
        key: key.to_string(),
        source,
    })?;
    for warning in &decoded.warnings {
        match warning.kind {
            WarningKind::UnknownField | WarningKind::ReadOnlyField => {
                debug!(key, warning = %warning, "field ignored")
            }
            _ => warn!(key, warning = %warning, "degraded decode"),
        }
    }
    Ok(decoded.value)
}
