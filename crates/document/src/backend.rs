use std::collections::BTreeSet;

use async_trait::async_trait;

use coursestate_storage::{StateDefaults, StateKey, StateRecord, StateStorage, StorageError};

use crate::collection::StateCollection;
use crate::document::StateDocument;
use crate::mongo::{MongoCollection, MongoParams};

/// Document-per-record backend.
///
/// The unique compound index is ensured once, when the backend is built.
///
/// `save` is a single atomic find-and-replace upsert with whole-document
/// replacement: fields absent from the saved record are dropped, so callers
/// pass the complete record.
///
/// `get_or_create` is not atomic. It reads, seeds a new record from the
/// defaults when none exists, and inserts it. A concurrent creator can win
/// between the read and the insert; the unique index then rejects this
/// insert and the call fails with [`StorageError::UniquenessConflict`],
/// which the caller should retry.
///
/// This layout stores neither `done` nor timestamps.
pub struct DocumentBackend<C = MongoCollection> {
    collection: C,
}

impl DocumentBackend<MongoCollection> {
    /// Connect to MongoDB and ensure the unique index.
    pub async fn connect(params: &MongoParams) -> Result<Self, StorageError> {
        Self::new(MongoCollection::connect(params)?).await
    }
}

impl<C: StateCollection> DocumentBackend<C> {
    pub async fn new(collection: C) -> Result<Self, StorageError> {
        collection.ensure_unique_index().await?;
        tracing::debug!(collection = %collection.describe(), "document state backend ready");
        Ok(Self { collection })
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }
}

#[async_trait]
impl<C: StateCollection> StateStorage for DocumentBackend<C> {
    async fn get(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_key: &str,
    ) -> Result<StateRecord, StorageError> {
        let key = StateKey::new(course_id, user_id, module_state_key);
        match self.collection.find_one(&key).await? {
            Some(doc) => Ok(doc.into_record()),
            None => Err(StorageError::not_found(&key, self.describe())),
        }
    }

    async fn get_or_create(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_key: &str,
        defaults: &StateDefaults,
    ) -> Result<StateRecord, StorageError> {
        let key = StateKey::new(course_id, user_id, module_state_key);
        if let Some(doc) = self.collection.find_one(&key).await? {
            return Ok(doc.into_record());
        }

        let mut record = StateRecord::from_key(&key);
        defaults.apply_to(&mut record);
        let doc = StateDocument::from(&record);
        if let Err(e) = self.collection.insert_one(&doc).await {
            if e.is_retryable() {
                tracing::warn!(%key, "lost get_or_create race on document store");
            }
            return Err(e);
        }
        Ok(doc.into_record())
    }

    async fn get_batch(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_keys: &BTreeSet<String>,
    ) -> Result<Vec<StateRecord>, StorageError> {
        if module_state_keys.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = module_state_keys.iter().cloned().collect();
        let docs = self.collection.find_many(course_id, user_id, &keys).await?;
        Ok(docs.into_iter().map(StateDocument::into_record).collect())
    }

    async fn save(&self, record: &StateRecord) -> Result<StateRecord, StorageError> {
        let doc = StateDocument::from(record);
        self.collection.replace_one_upsert(&doc).await?;
        Ok(doc.into_record())
    }

    async fn delete(&self, record: &StateRecord) -> Result<(), StorageError> {
        let key = record.key();
        if self.collection.delete_one(&key).await? == 0 {
            return Err(StorageError::not_found(&key, self.describe()));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("DocumentBackend({})", self.collection.describe())
    }
}
