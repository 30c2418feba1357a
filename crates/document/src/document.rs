use serde::{Deserialize, Serialize};

use coursestate_storage::{DoneStatus, ModuleType, StateKey, StateRecord};

/// The stored shape of a state record.
///
/// The layout carries no `done` flag and no timestamps; records read back
/// from it report `DoneStatus::NotApplicable` and unset timestamps. Unknown
/// fields (such as the store's own `_id`) are ignored on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    pub course_id: String,
    pub user_id: i64,
    pub module_state_key: String,
    pub module_type: ModuleType,
    pub state: Option<String>,
    pub grade: Option<f64>,
    pub max_grade: Option<f64>,
}

impl StateDocument {
    pub fn key(&self) -> StateKey {
        StateKey::new(self.course_id.clone(), self.user_id, self.module_state_key.clone())
    }

    pub fn into_record(self) -> StateRecord {
        StateRecord {
            course_id: self.course_id,
            user_id: self.user_id,
            module_state_key: self.module_state_key,
            module_type: self.module_type,
            state: self.state,
            grade: self.grade,
            max_grade: self.max_grade,
            done: DoneStatus::NotApplicable,
            created: None,
            modified: None,
        }
    }
}

impl From<&StateRecord> for StateDocument {
    fn from(record: &StateRecord) -> Self {
        Self {
            course_id: record.course_id.clone(),
            user_id: record.user_id,
            module_state_key: record.module_state_key.clone(),
            module_type: record.module_type.clone(),
            state: record.state.clone(),
            grade: record.grade,
            max_grade: record.max_grade,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_field_names() {
        let rec = StateRecord::new("MITx/6.002x/2012_Fall", 3, "i4x://p1").with_state("{}");
        let json = serde_json::to_value(StateDocument::from(&rec)).unwrap();
        let mut fields: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        fields.sort();
        assert_eq!(
            fields,
            [
                "course_id",
                "grade",
                "max_grade",
                "module_state_key",
                "module_type",
                "state",
                "user_id"
            ]
        );
        assert_eq!(json["module_type"], "problem");
        assert!(json["grade"].is_null());
    }

    #[test]
    fn read_ignores_store_id() {
        let doc: StateDocument = serde_json::from_value(serde_json::json!({
            "_id": "5123e4c2a1b2c3d4e5f60718",
            "course_id": "c",
            "user_id": 1,
            "module_state_key": "k",
            "module_type": "video",
            "state": null,
            "grade": null,
            "max_grade": null,
        }))
        .unwrap();
        let rec = doc.into_record();
        assert_eq!(rec.module_type, ModuleType::Video);
        assert_eq!(rec.done, DoneStatus::NotApplicable);
        assert!(rec.created.is_none());
    }
}
