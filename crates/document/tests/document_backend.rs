//! Behaviour specific to the document backend.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use coursestate_document::{DocumentBackend, MemoryCollection, StateCollection, StateDocument};
use coursestate_storage::{
    DoneStatus, StateDefaults, StateKey, StateRecord, StateStorage, StorageError,
};

const COURSE: &str = "MITx/6.002x/2012_Fall";

#[tokio::test]
async fn index_is_ensured_once_at_construction() {
    let backend = DocumentBackend::new(MemoryCollection::new("studentstate"))
        .await
        .unwrap();
    assert_eq!(backend.collection().index_builds(), 1);

    backend
        .save(&StateRecord::new(COURSE, 1, "i4x://p1"))
        .await
        .unwrap();
    backend.get(COURSE, 1, "i4x://p1").await.unwrap();
    assert_eq!(backend.collection().index_builds(), 1);
}

#[tokio::test]
async fn done_and_timestamps_are_not_stored() {
    let backend = DocumentBackend::new(MemoryCollection::new("studentstate"))
        .await
        .unwrap();
    let mut rec = StateRecord::new(COURSE, 1, "i4x://p1").with_state("{}");
    rec.done = DoneStatus::Finished;
    backend.save(&rec).await.unwrap();

    let got = backend.get(COURSE, 1, "i4x://p1").await.unwrap();
    assert_eq!(got.done, DoneStatus::NotApplicable);
    assert!(got.created.is_none() && got.modified.is_none());
}

#[tokio::test]
async fn saves_write_no_history_side_effects() {
    let collection = MemoryCollection::new("studentstate");
    let backend = DocumentBackend::new(collection).await.unwrap();
    for i in 0..3 {
        backend
            .save(&StateRecord::new(COURSE, 1, "i4x://p1").with_state(format!("{i}")))
            .await
            .unwrap();
    }
    assert_eq!(backend.collection().len().unwrap(), 1);
}

/// A collection whose first lookup misses a document that a rival writer
/// has already stored, reproducing the read-then-insert race.
struct RacingCollection {
    inner: MemoryCollection,
    missed_once: AtomicBool,
}

#[async_trait]
impl StateCollection for RacingCollection {
    async fn ensure_unique_index(&self) -> Result<(), StorageError> {
        self.inner.ensure_unique_index().await
    }

    async fn find_one(&self, key: &StateKey) -> Result<Option<StateDocument>, StorageError> {
        if !self.missed_once.swap(true, Ordering::SeqCst) {
            let rival = StateRecord::from_key(key).with_state("rival");
            self.inner.insert_one(&StateDocument::from(&rival)).await?;
            return Ok(None);
        }
        self.inner.find_one(key).await
    }

    async fn find_many(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_keys: &[String],
    ) -> Result<Vec<StateDocument>, StorageError> {
        self.inner.find_many(course_id, user_id, module_state_keys).await
    }

    async fn insert_one(&self, document: &StateDocument) -> Result<(), StorageError> {
        self.inner.insert_one(document).await
    }

    async fn replace_one_upsert(&self, document: &StateDocument) -> Result<(), StorageError> {
        self.inner.replace_one_upsert(document).await
    }

    async fn delete_one(&self, key: &StateKey) -> Result<u64, StorageError> {
        self.inner.delete_one(key).await
    }

    fn describe(&self) -> String {
        "racing".to_string()
    }
}

#[tokio::test]
async fn lost_create_race_surfaces_a_retryable_conflict() {
    let backend = DocumentBackend::new(RacingCollection {
        inner: MemoryCollection::new("studentstate"),
        missed_once: AtomicBool::new(false),
    })
    .await
    .unwrap();

    let defaults = StateDefaults::new().state("mine");
    let err = backend
        .get_or_create(COURSE, 1, "i4x://p1", &defaults)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::UniquenessConflict { .. }), "{err}");
    assert!(err.is_retryable());

    // Retrying reads the rival's record; nothing was overwritten.
    let rec = backend
        .get_or_create(COURSE, 1, "i4x://p1", &defaults)
        .await
        .unwrap();
    assert_eq!(rec.state.as_deref(), Some("rival"));
    let all = backend
        .get_batch(COURSE, 1, &BTreeSet::from(["i4x://p1".to_string()]))
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn describe_includes_the_collection() {
    let backend = DocumentBackend::new(MemoryCollection::new("studentstate"))
        .await
        .unwrap();
    assert_eq!(backend.describe(), "DocumentBackend(memory:studentstate)");
}
