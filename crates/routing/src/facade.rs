use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use coursestate_storage::{StateDefaults, StateRecord, StateStorage, StorageError};

use crate::config::StorageConfig;
use crate::router::BackendRouter;

/// Entry point for callers: resolves the backend for each course and
/// forwards the operation unchanged.
#[derive(Clone)]
pub struct StateFacade {
    router: Arc<BackendRouter>,
}

impl StateFacade {
    pub fn new(router: Arc<BackendRouter>) -> Self {
        Self { router }
    }

    /// Build the router for `config` and wrap it.
    pub async fn connect(config: StorageConfig) -> Result<Self, StorageError> {
        Ok(Self::new(Arc::new(BackendRouter::connect(config).await?)))
    }

    pub fn router(&self) -> &BackendRouter {
        &self.router
    }

    fn backend(&self, course_id: &str) -> Arc<dyn StateStorage> {
        let backend = self.router.backend_for_course(course_id);
        tracing::trace!(course_id, backend = %backend.describe(), "routed");
        backend
    }
}

#[async_trait]
impl StateStorage for StateFacade {
    async fn get(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_key: &str,
    ) -> Result<StateRecord, StorageError> {
        self.backend(course_id)
            .get(course_id, user_id, module_state_key)
            .await
    }

    async fn get_or_create(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_key: &str,
        defaults: &StateDefaults,
    ) -> Result<StateRecord, StorageError> {
        self.backend(course_id)
            .get_or_create(course_id, user_id, module_state_key, defaults)
            .await
    }

    async fn get_batch(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_keys: &BTreeSet<String>,
    ) -> Result<Vec<StateRecord>, StorageError> {
        self.backend(course_id)
            .get_batch(course_id, user_id, module_state_keys)
            .await
    }

    async fn save(&self, record: &StateRecord) -> Result<StateRecord, StorageError> {
        self.backend(&record.course_id).save(record).await
    }

    async fn delete(&self, record: &StateRecord) -> Result<(), StorageError> {
        self.backend(&record.course_id).delete(record).await
    }

    fn describe(&self) -> String {
        "StateFacade".to_string()
    }
}
