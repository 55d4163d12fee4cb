//! Backend key layout.
//!
//! ```text
//! Sessions/{session}/{entity type}/{entity id}.bin
//! Staging/{session}-{nonce}/{entity type}/{entity id}.bin
//! ```

use shelf_backend::key;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Container holding every session.
pub const SESSIONS_ROOT: &str = "Sessions";

/// Container holding in-progress session saves.
pub const STAGING_ROOT: &str = "Staging";

/// Suffix of every record blob.
pub const RECORD_EXTENSION: &str = ".bin";

pub fn session_container(session_id: &str) -> String {
    key::join(SESSIONS_ROOT, session_id)
}

pub fn type_container(session_id: &str, entity_type: &str) -> String {
    key::join(&session_container(session_id), entity_type)
}

pub fn record_key(session_id: &str, entity_type: &str, entity_id: &str) -> String {
    record_key_in(&session_container(session_id), entity_type, entity_id)
}

/// Record key under an arbitrary session-shaped container.
pub fn record_key_in(container: &str, entity_type: &str, entity_id: &str) -> String {
    key::join(
        &key::join(container, entity_type),
        &format!("{entity_id}{RECORD_EXTENSION}"),
    )
}

/// A fresh staging container for a save of `session_id`.
pub fn staging_container(session_id: &str) -> String {
    key::join(STAGING_ROOT, &format!("{session_id}-{}", Uuid::now_v7().simple()))
}

/// Entity id of a record key, or `None` if the blob is not a record.
pub fn record_id(key: &str) -> Option<&str> {
    key::file_name(key).strip_suffix(RECORD_EXTENSION)
}

/// Check that a session id can be used as a key segment.
pub fn validate_session_id(session_id: &str) -> StoreResult<()> {
    key::validate_segment(session_id)?;
    Ok(())
}

/// Check that an entity type name and id can be used as key segments.
pub fn validate_entity(entity_type: &str, entity_id: &str) -> StoreResult<()> {
    let invalid = |reason: String| StoreError::InvalidEntity {
        entity_type: entity_type.to_string(),
        reason,
    };
    key::validate_segment(entity_type).map_err(|e| invalid(format!("type name: {e}")))?;
    key::validate_segment(entity_id).map_err(|e| invalid(format!("identity: {e}")))?;
    Ok(())
}
