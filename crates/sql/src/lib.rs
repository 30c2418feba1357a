//! Relational storage backend for course module state.
//!
//! Rows live in `courseware_studentmodule`, one per
//! (student_id, module_id, course_id), with history snapshots in
//! `courseware_studentmodulehistory`. SQLite is reached through `sqlx`.
//!
//! The same database also holds field-scoped values ([`FieldStore`]) and
//! offline grades ([`GradeStore`]).

mod backend;
mod fields;
mod grades;
mod history;
mod row;
mod schema;

pub use backend::{connect_pool, RelationalBackend};
pub use fields::{FieldKey, FieldStore, FieldValue};
pub use grades::{GradeComputation, GradeStore, OfflineGrade};
pub use history::SqlHistoryLog;
pub use schema::run_migrations;

use coursestate_storage::StorageError;

pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}
