use std::collections::BTreeSet;

use async_trait::async_trait;
use tempfile::TempDir;

use coursestate_sql::RelationalBackend;
use coursestate_storage::{StateDefaults, StateRecord, StateStorage, StorageError};

/// A relational backend over a throwaway on-disk database. The directory
/// lives as long as the backend.
pub struct TempBackend {
    pub backend: RelationalBackend,
    _dir: TempDir,
}

impl TempBackend {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}", dir.path().join("state.db").display());
        let backend = RelationalBackend::connect("default", &url)
            .await
            .expect("connect");
        Self { backend, _dir: dir }
    }
}

#[async_trait]
impl StateStorage for TempBackend {
    async fn get(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_key: &str,
    ) -> Result<StateRecord, StorageError> {
        self.backend.get(course_id, user_id, module_state_key).await
    }

    async fn get_or_create(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_key: &str,
        defaults: &StateDefaults,
    ) -> Result<StateRecord, StorageError> {
        self.backend
            .get_or_create(course_id, user_id, module_state_key, defaults)
            .await
    }

    async fn get_batch(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_keys: &BTreeSet<String>,
    ) -> Result<Vec<StateRecord>, StorageError> {
        self.backend
            .get_batch(course_id, user_id, module_state_keys)
            .await
    }

    async fn save(&self, record: &StateRecord) -> Result<StateRecord, StorageError> {
        self.backend.save(record).await
    }

    async fn delete(&self, record: &StateRecord) -> Result<(), StorageError> {
        self.backend.delete(record).await
    }

    fn describe(&self) -> String {
        self.backend.describe()
    }
}
