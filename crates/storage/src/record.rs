use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::StorageError;

/// Module types whose saves are recorded in the history log. Kept small so
/// the history table stays bounded.
pub const HISTORY_TRACKED_TYPES: &[ModuleType] = &[ModuleType::Problem];

/// The kind of course module a state record belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ModuleType {
    #[default]
    Problem,
    Video,
    Html,
    Timelimit,
    /// Any module type not known to this crate, kept verbatim.
    Other(String),
}

impl ModuleType {
    pub fn as_str(&self) -> &str {
        match self {
            ModuleType::Problem => "problem",
            ModuleType::Video => "video",
            ModuleType::Html => "html",
            ModuleType::Timelimit => "timelimit",
            ModuleType::Other(name) => name,
        }
    }

    /// Whether a save of this module type appends a history entry.
    pub fn is_history_tracked(&self) -> bool {
        HISTORY_TRACKED_TYPES.contains(self)
    }
}

impl From<&str> for ModuleType {
    fn from(name: &str) -> Self {
        match name {
            "problem" => ModuleType::Problem,
            "video" => ModuleType::Video,
            "html" => ModuleType::Html,
            "timelimit" => ModuleType::Timelimit,
            other => ModuleType::Other(other.to_string()),
        }
    }
}

impl From<String> for ModuleType {
    fn from(name: String) -> Self {
        ModuleType::from(name.as_str())
    }
}

impl From<ModuleType> for String {
    fn from(module_type: ModuleType) -> Self {
        module_type.as_str().to_string()
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion status of a module. Persisted by the relational backend only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneStatus {
    #[default]
    NotApplicable,
    Finished,
    Incomplete,
}

impl DoneStatus {
    /// Short code stored in the `done` column.
    pub fn code(self) -> &'static str {
        match self {
            DoneStatus::NotApplicable => "na",
            DoneStatus::Finished => "f",
            DoneStatus::Incomplete => "i",
        }
    }
}

impl FromStr for DoneStatus {
    type Err = StorageError;

    /// Accepts both the stored code (`"f"`) and the long name (`"finished"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "na" | "not_applicable" => Ok(DoneStatus::NotApplicable),
            "f" | "finished" => Ok(DoneStatus::Finished),
            "i" | "incomplete" => Ok(DoneStatus::Incomplete),
            other => Err(StorageError::Backend(format!(
                "unknown done status '{other}'"
            ))),
        }
    }
}

/// The composite identity of a state record.
///
/// `module_state_key` can be shared by several module instances (A/B tested
/// content points many instances at one key), so it is not globally unique
/// to one piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey {
    pub course_id: String,
    pub user_id: i64,
    pub module_state_key: String,
}

impl StateKey {
    pub fn new(course_id: impl Into<String>, user_id: i64, module_state_key: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            user_id,
            module_state_key: module_state_key.into(),
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(course_id={}, user_id={}, module_state_key={})",
            self.course_id, self.user_id, self.module_state_key
        )
    }
}

/// One learner's state for one course module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub course_id: String,
    pub user_id: i64,
    pub module_state_key: String,
    pub module_type: ModuleType,
    /// Opaque serialized payload, JSON text by convention.
    pub state: Option<String>,
    pub grade: Option<f64>,
    pub max_grade: Option<f64>,
    pub done: DoneStatus,
    /// Set once on first insert. `None` until stored, and always `None` for
    /// backends whose layout carries no timestamps.
    #[serde(with = "crate::timestamp::option", default)]
    pub created: Option<OffsetDateTime>,
    /// Refreshed on every write.
    #[serde(with = "crate::timestamp::option", default)]
    pub modified: Option<OffsetDateTime>,
}

impl StateRecord {
    /// A fresh, unsaved record of type `problem` with no payload.
    pub fn new(course_id: impl Into<String>, user_id: i64, module_state_key: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            user_id,
            module_state_key: module_state_key.into(),
            module_type: ModuleType::default(),
            state: None,
            grade: None,
            max_grade: None,
            done: DoneStatus::default(),
            created: None,
            modified: None,
        }
    }

    pub fn from_key(key: &StateKey) -> Self {
        Self::new(key.course_id.clone(), key.user_id, key.module_state_key.clone())
    }

    pub fn key(&self) -> StateKey {
        StateKey::new(self.course_id.clone(), self.user_id, self.module_state_key.clone())
    }

    pub fn with_module_type(mut self, module_type: impl Into<ModuleType>) -> Self {
        self.module_type = module_type.into();
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_grade(mut self, grade: f64, max_grade: f64) -> Self {
        self.grade = Some(grade);
        self.max_grade = Some(max_grade);
        self
    }
}

/// A snapshot of a state record taken when it was saved.
///
/// History entries reference the relational row they were taken from and are
/// never mutated or deleted; they outlive the record itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub student_module_id: i64,
    /// Reserved; always `None`.
    pub version: Option<String>,
    /// The `modified` timestamp of the record at the triggering save.
    #[serde(with = "crate::timestamp::option")]
    pub created: Option<OffsetDateTime>,
    pub state: Option<String>,
    pub grade: Option<f64>,
    pub max_grade: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_problems_are_history_tracked() {
        assert!(ModuleType::Problem.is_history_tracked());
        assert!(!ModuleType::Video.is_history_tracked());
        assert!(!ModuleType::from("chapter").is_history_tracked());
    }

    #[test]
    fn unknown_module_types_are_kept_verbatim() {
        let t = ModuleType::from("sequential");
        assert_eq!(t, ModuleType::Other("sequential".to_string()));
        assert_eq!(t.to_string(), "sequential");
        assert_eq!(ModuleType::from("html"), ModuleType::Html);
    }

    #[test]
    fn done_status_codes() {
        assert_eq!(DoneStatus::Finished.code(), "f");
        assert_eq!("i".parse::<DoneStatus>().unwrap(), DoneStatus::Incomplete);
        assert_eq!("not_applicable".parse::<DoneStatus>().unwrap(), DoneStatus::NotApplicable);
        assert!("done".parse::<DoneStatus>().is_err());
    }

    #[test]
    fn new_record_defaults() {
        let rec = StateRecord::new("MITx/6.002x/2012_Fall", 7, "i4x://MITx/problem/p1");
        assert_eq!(rec.module_type, ModuleType::Problem);
        assert_eq!(rec.done, DoneStatus::NotApplicable);
        assert!(rec.state.is_none() && rec.created.is_none());
        assert_eq!(rec.key(), StateKey::new("MITx/6.002x/2012_Fall", 7, "i4x://MITx/problem/p1"));
    }

    #[test]
    fn record_serializes_module_type_as_string() {
        let rec = StateRecord::new("c", 1, "k").with_module_type("video");
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["module_type"], "video");
        assert_eq!(json["done"], "not_applicable");
        assert!(json["created"].is_null());
    }
}
