use async_trait::async_trait;
use sqlx::SqlitePool;

use coursestate_storage::timestamp::{format_timestamp, now};
use coursestate_storage::{HistoryEntry, HistoryLog, StateRecord, StorageError};

use crate::db_err;
use crate::row::{HistoryRow, HISTORY_COLUMNS};

/// History log stored in `courseware_studentmodulehistory`, next to the
/// state rows it snapshots.
#[derive(Debug, Clone)]
pub struct SqlHistoryLog {
    pool: SqlitePool,
}

impl SqlHistoryLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryLog for SqlHistoryLog {
    async fn append(
        &self,
        student_module_id: i64,
        record: &StateRecord,
    ) -> Result<HistoryEntry, StorageError> {
        // The entry is dated with the record's modified time, not our own clock.
        let created = format_timestamp(record.modified.unwrap_or_else(now))?;
        let row = sqlx::query_as::<_, HistoryRow>(&format!(
            "INSERT INTO courseware_studentmodulehistory
                (student_module_id, version, created, state, grade, max_grade)
             VALUES (?, NULL, ?, ?, ?, ?)
             RETURNING {HISTORY_COLUMNS}"
        ))
        .bind(student_module_id)
        .bind(created)
        .bind(record.state.as_deref())
        .bind(record.grade)
        .bind(record.max_grade)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        row.into_entry()
    }

    async fn entries(&self, student_module_id: i64) -> Result<Vec<HistoryEntry>, StorageError> {
        let rows = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM courseware_studentmodulehistory
             WHERE student_module_id = ?
             ORDER BY created, id"
        ))
        .bind(student_module_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(HistoryRow::into_entry).collect()
    }

    async fn latest(
        &self,
        student_module_id: i64,
    ) -> Result<Option<HistoryEntry>, StorageError> {
        let row = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM courseware_studentmodulehistory
             WHERE student_module_id = ?
             ORDER BY created DESC, id DESC
             LIMIT 1"
        ))
        .bind(student_module_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(HistoryRow::into_entry).transpose()
    }
}
