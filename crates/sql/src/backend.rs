use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};

use coursestate_storage::timestamp::{format_timestamp, now};
use coursestate_storage::{
    HistoryEntry, HistoryLog, StateDefaults, StateKey, StateRecord, StateStorage, StorageError,
};

use crate::db_err;
use crate::fields::FieldStore;
use crate::grades::GradeStore;
use crate::history::SqlHistoryLog;
use crate::row::{StudentModuleRow, STUDENT_MODULE_COLUMNS};
use crate::schema::run_migrations;

/// SQLite caps bound parameters per statement; batch reads are chunked below it.
const BATCH_CHUNK: usize = 500;

/// Open a pool for a `sqlite://` URL, creating the database file if needed.
pub async fn connect_pool(url: &str) -> Result<SqlitePool, StorageError> {
    let opts = SqliteConnectOptions::from_str(url)
        .map_err(|e| StorageError::Config(format!("invalid SQLite url '{url}': {e}")))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(opts)
        .await
        .map_err(db_err)
}

/// Row-per-record backend over `courseware_studentmodule`.
///
/// `get_or_create` and `save` are single `INSERT ... ON CONFLICT` statements
/// keyed on the unique (student_id, module_id, course_id) index, so
/// concurrent writers never produce duplicate rows.
///
/// Every successful write of a history-tracked module type (creation
/// included) appends one snapshot to the history log. A failed append is
/// logged and does not fail the write.
#[derive(Clone)]
pub struct RelationalBackend {
    alias: String,
    pool: SqlitePool,
    history: Arc<dyn HistoryLog>,
}

impl RelationalBackend {
    /// Connect to `url`, create the schema, and name the backend `alias`.
    pub async fn connect(alias: &str, url: &str) -> Result<Self, StorageError> {
        let pool = connect_pool(url).await?;
        Self::from_pool(alias, pool).await
    }

    /// Build a backend over an existing pool, creating the schema if needed.
    pub async fn from_pool(alias: &str, pool: SqlitePool) -> Result<Self, StorageError> {
        run_migrations(&pool).await?;
        tracing::debug!(alias, "relational state backend ready");
        Ok(Self {
            alias: alias.to_string(),
            history: Arc::new(SqlHistoryLog::new(pool.clone())),
            pool,
        })
    }

    /// Replace the history log (the default writes to the same database).
    pub fn with_history_log(mut self, history: Arc<dyn HistoryLog>) -> Self {
        self.history = history;
        self
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn history(&self) -> &dyn HistoryLog {
        self.history.as_ref()
    }

    /// Field-scoped values in this backend's database.
    pub fn fields(&self) -> FieldStore {
        FieldStore::new(self.pool.clone())
    }

    /// Offline grades in this backend's database.
    pub fn grades(&self) -> GradeStore {
        GradeStore::new(self.pool.clone())
    }

    /// Row id of the record with the given key, if it exists.
    pub async fn student_module_id(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_key: &str,
    ) -> Result<Option<i64>, StorageError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT id FROM courseware_studentmodule
             WHERE course_id = ? AND student_id = ? AND module_id = ?",
        )
        .bind(course_id)
        .bind(user_id)
        .bind(module_state_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    /// History of a stored record, oldest first.
    ///
    /// The record is looked up by key, so this fails with `NotFound` once it
    /// is deleted. History itself is kept: read it through
    /// [`history`](Self::history) with the row id from
    /// [`student_module_id`](Self::student_module_id), taken while the
    /// record exists.
    pub async fn history_for(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_key: &str,
    ) -> Result<Vec<HistoryEntry>, StorageError> {
        let id = self.require_id(course_id, user_id, module_state_key).await?;
        self.history.entries(id).await
    }

    /// Most recent history entry of a stored record. Like
    /// [`history_for`](Self::history_for), `NotFound` after deletion.
    pub async fn latest_history(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_key: &str,
    ) -> Result<Option<HistoryEntry>, StorageError> {
        let id = self.require_id(course_id, user_id, module_state_key).await?;
        self.history.latest(id).await
    }

    async fn require_id(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_key: &str,
    ) -> Result<i64, StorageError> {
        self.student_module_id(course_id, user_id, module_state_key)
            .await?
            .ok_or_else(|| {
                StorageError::not_found(
                    &StateKey::new(course_id, user_id, module_state_key),
                    self.describe(),
                )
            })
    }

    async fn fetch_row(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_key: &str,
    ) -> Result<Option<StudentModuleRow>, StorageError> {
        sqlx::query_as::<_, StudentModuleRow>(&format!(
            "SELECT {STUDENT_MODULE_COLUMNS} FROM courseware_studentmodule
             WHERE course_id = ? AND student_id = ? AND module_id = ?"
        ))
        .bind(course_id)
        .bind(user_id)
        .bind(module_state_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    /// Append a history snapshot for a tracked record. Failures are logged only.
    async fn record_history(&self, student_module_id: i64, record: &StateRecord) {
        if !record.module_type.is_history_tracked() {
            return;
        }
        if let Err(e) = self.history.append(student_module_id, record).await {
            tracing::error!(
                backend = %self.describe(),
                student_module_id,
                key = %record.key(),
                error = %e,
                "failed to append state history entry"
            );
        }
    }
}

#[async_trait]
impl StateStorage for RelationalBackend {
    async fn get(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_key: &str,
    ) -> Result<StateRecord, StorageError> {
        match self.fetch_row(course_id, user_id, module_state_key).await? {
            Some(row) => row.into_record(),
            None => Err(StorageError::not_found(
                &StateKey::new(course_id, user_id, module_state_key),
                self.describe(),
            )),
        }
    }

    async fn get_or_create(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_key: &str,
        defaults: &StateDefaults,
    ) -> Result<StateRecord, StorageError> {
        let mut seed = StateRecord::new(course_id, user_id, module_state_key);
        defaults.apply_to(&mut seed);
        let ts = format_timestamp(now())?;

        let inserted = sqlx::query(
            "INSERT INTO courseware_studentmodule
                (module_type, module_id, student_id, course_id, state, grade, max_grade,
                 done, created, modified)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (student_id, module_id, course_id) DO NOTHING",
        )
        .bind(seed.module_type.as_str())
        .bind(module_state_key)
        .bind(user_id)
        .bind(course_id)
        .bind(seed.state.as_deref())
        .bind(seed.grade)
        .bind(seed.max_grade)
        .bind(seed.done.code())
        .bind(&ts)
        .bind(&ts)
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .rows_affected()
            == 1;

        let row = self
            .fetch_row(course_id, user_id, module_state_key)
            .await?
            .ok_or_else(|| {
                StorageError::Backend(format!(
                    "record {} vanished right after get_or_create",
                    seed.key()
                ))
            })?;
        let id = row.id;
        let record = row.into_record()?;
        if inserted {
            tracing::debug!(key = %record.key(), "created module state");
            self.record_history(id, &record).await;
        }
        Ok(record)
    }

    async fn get_batch(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_keys: &BTreeSet<String>,
    ) -> Result<Vec<StateRecord>, StorageError> {
        let keys: Vec<&String> = module_state_keys.iter().collect();
        let mut records = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(BATCH_CHUNK) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT {STUDENT_MODULE_COLUMNS} FROM courseware_studentmodule WHERE course_id = "
            ));
            qb.push_bind(course_id);
            qb.push(" AND student_id = ");
            qb.push_bind(user_id);
            qb.push(" AND module_id IN (");
            let mut separated = qb.separated(", ");
            for key in chunk {
                separated.push_bind(key.as_str());
            }
            separated.push_unseparated(")");

            let rows = qb
                .build_query_as::<StudentModuleRow>()
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
            for row in rows {
                records.push(row.into_record()?);
            }
        }
        Ok(records)
    }

    async fn save(&self, record: &StateRecord) -> Result<StateRecord, StorageError> {
        let ts = format_timestamp(now())?;
        let row = sqlx::query_as::<_, StudentModuleRow>(&format!(
            "INSERT INTO courseware_studentmodule
                (module_type, module_id, student_id, course_id, state, grade, max_grade,
                 done, created, modified)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (student_id, module_id, course_id) DO UPDATE SET
                module_type = excluded.module_type,
                state = excluded.state,
                grade = excluded.grade,
                max_grade = excluded.max_grade,
                modified = excluded.modified
             RETURNING {STUDENT_MODULE_COLUMNS}"
        ))
        .bind(record.module_type.as_str())
        .bind(&record.module_state_key)
        .bind(record.user_id)
        .bind(&record.course_id)
        .bind(record.state.as_deref())
        .bind(record.grade)
        .bind(record.max_grade)
        .bind(record.done.code())
        .bind(&ts)
        .bind(&ts)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        let id = row.id;
        let stored = row.into_record()?;
        self.record_history(id, &stored).await;
        Ok(stored)
    }

    async fn delete(&self, record: &StateRecord) -> Result<(), StorageError> {
        let affected = sqlx::query(
            "DELETE FROM courseware_studentmodule
             WHERE course_id = ? AND student_id = ? AND module_id = ?",
        )
        .bind(&record.course_id)
        .bind(record.user_id)
        .bind(&record.module_state_key)
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .rows_affected();

        if affected == 0 {
            return Err(StorageError::not_found(&record.key(), self.describe()));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("RelationalBackend({})", self.alias)
    }
}
