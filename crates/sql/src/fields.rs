//! Key/value stores for module fields that are not tied to one state record.
//!
//! Each scope has its own table with its own unique key. Values are opaque
//! JSON text; an absent value reads as `None`, which callers treat as JSON
//! `null`.

use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use time::OffsetDateTime;

use coursestate_storage::timestamp::{format_timestamp, now, parse_timestamp};
use coursestate_storage::StorageError;

use crate::db_err;

/// Identity of one field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKey {
    /// Shared by every learner of one module usage.
    UserStateSummary { usage_id: String, field_name: String },
    /// One learner's preference for every module of a type.
    StudentPrefs {
        student_id: i64,
        module_type: String,
        field_name: String,
    },
    /// One learner's value across all modules.
    StudentInfo { student_id: i64, field_name: String },
}

impl FieldKey {
    pub fn user_state_summary(usage_id: impl Into<String>, field_name: impl Into<String>) -> Self {
        FieldKey::UserStateSummary {
            usage_id: usage_id.into(),
            field_name: field_name.into(),
        }
    }

    pub fn student_prefs(
        student_id: i64,
        module_type: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        FieldKey::StudentPrefs {
            student_id,
            module_type: module_type.into(),
            field_name: field_name.into(),
        }
    }

    pub fn student_info(student_id: i64, field_name: impl Into<String>) -> Self {
        FieldKey::StudentInfo {
            student_id,
            field_name: field_name.into(),
        }
    }

    pub fn field_name(&self) -> &str {
        match self {
            FieldKey::UserStateSummary { field_name, .. }
            | FieldKey::StudentPrefs { field_name, .. }
            | FieldKey::StudentInfo { field_name, .. } => field_name,
        }
    }

    fn table(&self) -> &'static str {
        match self {
            FieldKey::UserStateSummary { .. } => "courseware_xmoduleuserstatesummaryfield",
            FieldKey::StudentPrefs { .. } => "courseware_xmodulestudentprefsfield",
            FieldKey::StudentInfo { .. } => "courseware_xmodulestudentinfofield",
        }
    }

    /// Columns of the table's unique index, in index order.
    fn key_columns(&self) -> &'static str {
        match self {
            FieldKey::UserStateSummary { .. } => "usage_id, field_name",
            FieldKey::StudentPrefs { .. } => "student_id, module_type, field_name",
            FieldKey::StudentInfo { .. } => "student_id, field_name",
        }
    }

    /// Bind the key values in `key_columns` order, comma separated.
    fn push_key_values<'a>(&'a self, qb: &mut QueryBuilder<'a, Sqlite>) {
        match self {
            FieldKey::UserStateSummary {
                usage_id,
                field_name,
            } => {
                qb.push_bind(usage_id.as_str())
                    .push(", ")
                    .push_bind(field_name.as_str());
            }
            FieldKey::StudentPrefs {
                student_id,
                module_type,
                field_name,
            } => {
                qb.push_bind(*student_id)
                    .push(", ")
                    .push_bind(module_type.as_str())
                    .push(", ")
                    .push_bind(field_name.as_str());
            }
            FieldKey::StudentInfo {
                student_id,
                field_name,
            } => {
                qb.push_bind(*student_id)
                    .push(", ")
                    .push_bind(field_name.as_str());
            }
        }
    }

    fn push_filter<'a>(&'a self, qb: &mut QueryBuilder<'a, Sqlite>) {
        match self {
            FieldKey::UserStateSummary {
                usage_id,
                field_name,
            } => {
                qb.push(" WHERE usage_id = ")
                    .push_bind(usage_id.as_str())
                    .push(" AND field_name = ")
                    .push_bind(field_name.as_str());
            }
            FieldKey::StudentPrefs {
                student_id,
                module_type,
                field_name,
            } => {
                qb.push(" WHERE student_id = ")
                    .push_bind(*student_id)
                    .push(" AND module_type = ")
                    .push_bind(module_type.as_str())
                    .push(" AND field_name = ")
                    .push_bind(field_name.as_str());
            }
            FieldKey::StudentInfo {
                student_id,
                field_name,
            } => {
                qb.push(" WHERE student_id = ")
                    .push_bind(*student_id)
                    .push(" AND field_name = ")
                    .push_bind(field_name.as_str());
            }
        }
    }
}

/// A stored field value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    pub key: FieldKey,
    pub value: String,
    pub created: OffsetDateTime,
    pub modified: OffsetDateTime,
}

#[derive(Debug, FromRow)]
struct FieldRow {
    value: String,
    created: String,
    modified: String,
}

impl FieldRow {
    fn into_value(self, key: &FieldKey) -> Result<FieldValue, StorageError> {
        Ok(FieldValue {
            key: key.clone(),
            value: self.value,
            created: parse_timestamp(&self.created)?,
            modified: parse_timestamp(&self.modified)?,
        })
    }
}

/// Field values for all three scopes, in the relational database.
#[derive(Debug, Clone)]
pub struct FieldStore {
    pool: SqlitePool,
}

impl FieldStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &FieldKey) -> Result<Option<FieldValue>, StorageError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT value, created, modified FROM {}",
            key.table()
        ));
        key.push_filter(&mut qb);
        let row = qb
            .build_query_as::<FieldRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|r| r.into_value(key)).transpose()
    }

    /// Store `value` under `key` in one upsert. `created` survives overwrites.
    pub async fn set(&self, key: &FieldKey, value: &str) -> Result<FieldValue, StorageError> {
        let ts = format_timestamp(now())?;
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "INSERT INTO {} ({}, value, created, modified) VALUES (",
            key.table(),
            key.key_columns()
        ));
        key.push_key_values(&mut qb);
        qb.push(", ")
            .push_bind(value)
            .push(", ")
            .push_bind(ts.as_str())
            .push(", ")
            .push_bind(ts.as_str());
        qb.push(format!(
            ") ON CONFLICT ({}) DO UPDATE SET value = excluded.value, modified = excluded.modified \
             RETURNING value, created, modified",
            key.key_columns()
        ));
        let row = qb
            .build_query_as::<FieldRow>()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        row.into_value(key)
    }

    /// Remove the value. Returns whether one existed.
    pub async fn delete(&self, key: &FieldKey) -> Result<bool, StorageError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("DELETE FROM {}", key.table()));
        key.push_filter(&mut qb);
        let affected = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(db_err)?
            .rows_affected();
        Ok(affected > 0)
    }
}
