use shelf_backend::BackendError;
use shelf_codec::CodecError;

/// Errors from document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The session has never been created or was dropped.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// No record is stored at the key.
    #[error("record not found: {key}")]
    NotFound { key: String },

    /// The entity has no usable identity.
    #[error("invalid {entity_type} entity: {reason}")]
    InvalidEntity { entity_type: String, reason: String },

    /// A stored record could not be encoded or decoded.
    #[error("codec error for {key}: {source}")]
    Codec {
        key: String,
        #[source]
        source: CodecError,
    },

    /// Error from the storage backend.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// A bulk operation failed for some records and succeeded for the rest.
    #[error(
        "{operation} failed for {} of {} records",
        .failures.len(),
        .succeeded + .failures.len()
    )]
    PartialFailure {
        operation: &'static str,
        succeeded: usize,
        /// Key and error of every record that failed.
        failures: Vec<(String, StoreError)>,
    },

    /// Two Rust types claim the same entity type name.
    #[error("entity type {type_name} is already bound to a different Rust type")]
    TypeConflict { type_name: String },

    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Returns `true` for the not-found family of errors.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::SessionNotFound(_) | Self::NotFound { .. } => true,
            Self::Backend(e) => e.is_not_found(),
            _ => false,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_display() {
        let err = StoreError::PartialFailure {
            operation: "update",
            succeeded: 3,
            failures: vec![(
                "Sessions/s1/User/u1.bin".into(),
                StoreError::NotFound {
                    key: "Sessions/s1/User/u1.bin".into(),
                },
            )],
        };
        assert_eq!(err.to_string(), "update failed for 1 of 4 records");
    }

    #[test]
    fn not_found_family() {
        assert!(StoreError::SessionNotFound("s".into()).is_not_found());
        assert!(StoreError::Backend(BackendError::NotFound("k".into())).is_not_found());
        assert!(!StoreError::Config("bad".into()).is_not_found());
    }
}
