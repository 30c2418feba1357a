use sqlx::FromRow;

use coursestate_storage::timestamp::parse_timestamp;
use coursestate_storage::{HistoryEntry, StateRecord, StorageError};

pub(crate) const STUDENT_MODULE_COLUMNS: &str = "id, module_type, module_id, student_id, \
     course_id, state, grade, max_grade, done, created, modified";

pub(crate) const HISTORY_COLUMNS: &str =
    "id, student_module_id, version, created, state, grade, max_grade";

/// One row of `courseware_studentmodule`.
#[derive(Debug, FromRow)]
pub(crate) struct StudentModuleRow {
    pub id: i64,
    pub module_type: String,
    pub module_id: String,
    pub student_id: i64,
    pub course_id: String,
    pub state: Option<String>,
    pub grade: Option<f64>,
    pub max_grade: Option<f64>,
    pub done: String,
    pub created: String,
    pub modified: String,
}

impl StudentModuleRow {
    pub fn into_record(self) -> Result<StateRecord, StorageError> {
        Ok(StateRecord {
            course_id: self.course_id,
            user_id: self.student_id,
            module_state_key: self.module_id,
            module_type: self.module_type.into(),
            state: self.state,
            grade: self.grade,
            max_grade: self.max_grade,
            done: self.done.parse()?,
            created: Some(parse_timestamp(&self.created)?),
            modified: Some(parse_timestamp(&self.modified)?),
        })
    }
}

/// One row of `courseware_studentmodulehistory`.
#[derive(Debug, FromRow)]
pub(crate) struct HistoryRow {
    pub id: i64,
    pub student_module_id: i64,
    pub version: Option<String>,
    pub created: String,
    pub state: Option<String>,
    pub grade: Option<f64>,
    pub max_grade: Option<f64>,
}

impl HistoryRow {
    pub fn into_entry(self) -> Result<HistoryEntry, StorageError> {
        Ok(HistoryEntry {
            id: self.id,
            student_module_id: self.student_module_id,
            version: self.version,
            created: Some(parse_timestamp(&self.created)?),
            state: self.state,
            grade: self.grade,
            max_grade: self.max_grade,
        })
    }
}
