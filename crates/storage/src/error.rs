use crate::record::StateKey;

/// All errors that can be returned by a `StateStorage` implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No record with the given (course_id, user_id, module_state_key).
    #[error(
        "could not find module state for (course_id={course_id}, user_id={user_id}, \
         module_state_key={module_state_key}) using {backend}"
    )]
    NotFound {
        course_id: String,
        user_id: i64,
        module_state_key: String,
        backend: String,
    },

    /// Two writers raced to create the same record and the store's unique
    /// index rejected the loser. The caller should re-run the operation.
    #[error(
        "uniqueness conflict on (course_id={course_id}, user_id={user_id}, \
         module_state_key={module_state_key})"
    )]
    UniquenessConflict {
        course_id: String,
        user_id: i64,
        module_state_key: String,
    },

    /// A defaults mapping named a field outside the settable set, or carried
    /// a value of the wrong type.
    #[error("invalid defaults: {0}")]
    InvalidDefaults(String),

    /// Storage configuration could not be read, parsed or resolved.
    #[error("storage configuration error: {0}")]
    Config(String),

    /// A backend-specific storage error (DB connection, decoding, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Whether re-running the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::UniquenessConflict { .. })
    }

    pub fn not_found(key: &StateKey, backend: impl Into<String>) -> Self {
        StorageError::NotFound {
            course_id: key.course_id.clone(),
            user_id: key.user_id,
            module_state_key: key.module_state_key.clone(),
            backend: backend.into(),
        }
    }

    pub fn conflict(key: &StateKey) -> Self {
        StorageError::UniquenessConflict {
            course_id: key.course_id.clone(),
            user_id: key.user_id,
            module_state_key: key.module_state_key.clone(),
        }
    }
}
