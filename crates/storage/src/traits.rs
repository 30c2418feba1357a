use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::defaults::StateDefaults;
use crate::error::StorageError;
use crate::record::{HistoryEntry, StateRecord};

/// The storage trait for course module state backends.
///
/// A `StateStorage` implementation stores one [`StateRecord`] per
/// (course_id, user_id, module_state_key) and exposes a narrow key-based
/// access pattern. Every implementation presents the same semantics so the
/// router can hand out any of them behind `Arc<dyn StateStorage>`.
///
/// ## Upsert Semantics
///
/// `save` creates the record when absent and otherwise overwrites
/// `module_type`, `state`, `grade` and `max_grade`. `created` is preserved on
/// update; `modified` is refreshed on every write when the backend keeps
/// timestamps.
///
/// ## get_or_create
///
/// Defaults are applied only to a record this call creates. Whether the
/// call is atomic under concurrent creators is backend-specific and
/// documented on each implementation; a backend that can lose the race
/// returns [`StorageError::UniquenessConflict`], which is retryable.
///
/// ## Missing Records
///
/// `get` and `delete` return [`StorageError::NotFound`] when no record
/// matches the key.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be shared across
/// async task boundaries.
#[async_trait]
pub trait StateStorage: Send + Sync + 'static {
    /// Read one record.
    async fn get(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_key: &str,
    ) -> Result<StateRecord, StorageError>;

    /// Read one record, creating it from `defaults` if absent.
    async fn get_or_create(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_key: &str,
        defaults: &StateDefaults,
    ) -> Result<StateRecord, StorageError>;

    /// Read every existing record among `module_state_keys` for one learner
    /// in one course. Missing keys are skipped; the order is unspecified.
    async fn get_batch(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_keys: &BTreeSet<String>,
    ) -> Result<Vec<StateRecord>, StorageError>;

    /// Insert or update `record` by its composite key and return the stored
    /// version.
    async fn save(&self, record: &StateRecord) -> Result<StateRecord, StorageError>;

    /// Remove the record matching `record`'s composite key.
    async fn delete(&self, record: &StateRecord) -> Result<(), StorageError>;

    /// Human readable backend identity, used in logs and error messages.
    fn describe(&self) -> String;
}

/// Append-only ledger of state record snapshots.
#[async_trait]
pub trait HistoryLog: Send + Sync + 'static {
    /// Append one snapshot of `record`, stored under row id `student_module_id`.
    async fn append(
        &self,
        student_module_id: i64,
        record: &StateRecord,
    ) -> Result<HistoryEntry, StorageError>;

    /// All entries for one student module, oldest first.
    async fn entries(&self, student_module_id: i64) -> Result<Vec<HistoryEntry>, StorageError>;

    /// The most recent entry for one student module.
    async fn latest(&self, student_module_id: i64)
        -> Result<Option<HistoryEntry>, StorageError>;
}
