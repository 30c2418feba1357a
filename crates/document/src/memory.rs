use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use coursestate_storage::{StateKey, StorageError};

use crate::collection::StateCollection;
use crate::document::StateDocument;

/// In-process collection keyed by the composite identity.
///
/// Suitable for embedding and tests. The map key enforces the same
/// uniqueness the unique index gives a real store.
#[derive(Debug, Default)]
pub struct MemoryCollection {
    name: String,
    documents: Mutex<BTreeMap<StateKey, StateDocument>>,
    index_builds: AtomicUsize,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Number of stored documents. Fails like every other access once a
    /// writer has panicked while holding the lock.
    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// How many times `ensure_unique_index` has been called.
    pub fn index_builds(&self) -> usize {
        self.index_builds.load(Ordering::SeqCst)
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<StateKey, StateDocument>>, StorageError> {
        self.documents
            .lock()
            .map_err(|_| StorageError::Backend(format!("collection '{}' is poisoned", self.name)))
    }
}

#[async_trait]
impl StateCollection for MemoryCollection {
    async fn ensure_unique_index(&self) -> Result<(), StorageError> {
        self.index_builds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_one(&self, key: &StateKey) -> Result<Option<StateDocument>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn find_many(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_keys: &[String],
    ) -> Result<Vec<StateDocument>, StorageError> {
        let docs = self.lock()?;
        Ok(module_state_keys
            .iter()
            .filter_map(|k| docs.get(&StateKey::new(course_id, user_id, k.as_str())))
            .cloned()
            .collect())
    }

    async fn insert_one(&self, document: &StateDocument) -> Result<(), StorageError> {
        let key = document.key();
        let mut docs = self.lock()?;
        if docs.contains_key(&key) {
            return Err(StorageError::conflict(&key));
        }
        docs.insert(key, document.clone());
        Ok(())
    }

    async fn replace_one_upsert(&self, document: &StateDocument) -> Result<(), StorageError> {
        self.lock()?.insert(document.key(), document.clone());
        Ok(())
    }

    async fn delete_one(&self, key: &StateKey) -> Result<u64, StorageError> {
        Ok(self.lock()?.remove(key).map_or(0, |_| 1))
    }

    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursestate_storage::StateRecord;

    #[tokio::test]
    async fn insert_rejects_duplicates_with_conflict() {
        let c = MemoryCollection::new("studentstate");
        let doc = StateDocument::from(&StateRecord::new("c", 1, "k"));
        c.insert_one(&doc).await.unwrap();
        let err = c.insert_one(&doc).await.unwrap_err();
        assert!(err.is_retryable(), "{err}");
        assert_eq!(c.len().unwrap(), 1);
    }

    #[test]
    fn poisoned_lock_fails_len_instead_of_reporting_empty() {
        let c = MemoryCollection::new("studentstate");
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = c.documents.lock().unwrap();
            panic!("writer panicked");
        }));
        assert!(matches!(c.len(), Err(StorageError::Backend(_))));
        assert!(c.is_empty().is_err());
    }

    #[tokio::test]
    async fn find_many_skips_missing_keys() {
        let c = MemoryCollection::new("studentstate");
        c.insert_one(&StateDocument::from(&StateRecord::new("c", 1, "a")))
            .await
            .unwrap();
        let found = c
            .find_many("c", 1, &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
