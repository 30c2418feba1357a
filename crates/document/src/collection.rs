use async_trait::async_trait;

use coursestate_storage::{StateKey, StorageError};

use crate::document::StateDocument;

/// The document operations the backend needs from a store.
///
/// Writes that collide with the unique (course_id, user_id,
/// module_state_key) index must fail with
/// [`StorageError::UniquenessConflict`].
#[async_trait]
pub trait StateCollection: Send + Sync + 'static {
    /// Create the unique compound index if it does not exist yet.
    async fn ensure_unique_index(&self) -> Result<(), StorageError>;

    async fn find_one(&self, key: &StateKey) -> Result<Option<StateDocument>, StorageError>;

    /// Documents of one learner in one course whose key is in `module_state_keys`.
    async fn find_many(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_keys: &[String],
    ) -> Result<Vec<StateDocument>, StorageError>;

    /// Insert a new document; fails if one with the same key exists.
    async fn insert_one(&self, document: &StateDocument) -> Result<(), StorageError>;

    /// Atomically replace the document with the same key, inserting it if
    /// absent. The stored document becomes exactly `document`.
    async fn replace_one_upsert(&self, document: &StateDocument) -> Result<(), StorageError>;

    /// Delete the document with `key`, returning how many were removed.
    async fn delete_one(&self, key: &StateKey) -> Result<u64, StorageError>;

    fn describe(&self) -> String;
}
