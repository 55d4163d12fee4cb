/// Errors from storage backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// No blob or container exists at the key.
    #[error("not found: {0}")]
    NotFound(String),

    /// The key is malformed.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// The backend was used before `initialize`.
    #[error("backend is not initialized")]
    NotInitialized,

    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A thread panicked while holding the backend lock.
    #[error("backend lock poisoned")]
    LockPoisoned,
}

impl BackendError {
    /// Returns `true` for [`BackendError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
