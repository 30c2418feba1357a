use serde_json::{Map, Value};

use crate::error::StorageError;
use crate::record::{DoneStatus, ModuleType, StateRecord};

/// Field values used to seed a record that `get_or_create` has to create.
///
/// Only the fields listed here can be seeded; identity and timestamps are
/// owned by the store. A `None` field leaves the record's value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDefaults {
    pub module_type: Option<ModuleType>,
    pub state: Option<String>,
    pub grade: Option<f64>,
    pub max_grade: Option<f64>,
    pub done: Option<DoneStatus>,
}

impl StateDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module_type(mut self, module_type: impl Into<ModuleType>) -> Self {
        self.module_type = Some(module_type.into());
        self
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn grade(mut self, grade: f64) -> Self {
        self.grade = Some(grade);
        self
    }

    pub fn max_grade(mut self, max_grade: f64) -> Self {
        self.max_grade = Some(max_grade);
        self
    }

    pub fn done(mut self, done: DoneStatus) -> Self {
        self.done = Some(done);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite the fields of `record` that these defaults set.
    pub fn apply_to(&self, record: &mut StateRecord) {
        if let Some(module_type) = &self.module_type {
            record.module_type = module_type.clone();
        }
        if let Some(state) = &self.state {
            record.state = Some(state.clone());
        }
        if let Some(grade) = self.grade {
            record.grade = Some(grade);
        }
        if let Some(max_grade) = self.max_grade {
            record.max_grade = Some(max_grade);
        }
        if let Some(done) = self.done {
            record.done = done;
        }
    }
}

impl TryFrom<&Map<String, Value>> for StateDefaults {
    type Error = StorageError;

    /// Build defaults from a field → value mapping.
    ///
    /// A JSON `null` leaves the field unset. A non-string `state` value is
    /// stored as its JSON text.
    fn try_from(map: &Map<String, Value>) -> Result<Self, Self::Error> {
        let mut defaults = StateDefaults::default();
        for (field, value) in map {
            if value.is_null() {
                continue;
            }
            match field.as_str() {
                "module_type" => defaults.module_type = Some(expect_str(field, value)?.into()),
                "state" => {
                    defaults.state = Some(match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                }
                "grade" => defaults.grade = Some(expect_f64(field, value)?),
                "max_grade" => defaults.max_grade = Some(expect_f64(field, value)?),
                "done" => {
                    let done = expect_str(field, value)?
                        .parse::<DoneStatus>()
                        .map_err(|e| StorageError::InvalidDefaults(e.to_string()))?;
                    defaults.done = Some(done);
                }
                other => {
                    return Err(StorageError::InvalidDefaults(format!(
                        "field '{other}' cannot be set through defaults"
                    )))
                }
            }
        }
        Ok(defaults)
    }
}

fn expect_str<'a>(field: &str, value: &'a Value) -> Result<&'a str, StorageError> {
    value.as_str().ok_or_else(|| {
        StorageError::InvalidDefaults(format!("field '{field}' must be a string, got {value}"))
    })
}

fn expect_f64(field: &str, value: &Value) -> Result<f64, StorageError> {
    value.as_f64().ok_or_else(|| {
        StorageError::InvalidDefaults(format!("field '{field}' must be a number, got {value}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn apply_only_touches_set_fields() {
        let mut rec = StateRecord::new("c", 1, "k").with_state("{\"attempts\":1}");
        StateDefaults::new().grade(0.5).apply_to(&mut rec);
        assert_eq!(rec.state.as_deref(), Some("{\"attempts\":1}"));
        assert_eq!(rec.grade, Some(0.5));
        assert_eq!(rec.max_grade, None);
    }

    #[test]
    fn from_mapping() {
        let defaults = StateDefaults::try_from(&map(json!({
            "module_type": "video",
            "state": {"position": 12},
            "max_grade": 3,
            "done": "i",
            "grade": null,
        })))
        .unwrap();
        assert_eq!(defaults.module_type, Some(ModuleType::Video));
        assert_eq!(defaults.state.as_deref(), Some("{\"position\":12}"));
        assert_eq!(defaults.max_grade, Some(3.0));
        assert_eq!(defaults.done, Some(DoneStatus::Incomplete));
        assert_eq!(defaults.grade, None);
    }

    #[test]
    fn rejects_fields_outside_the_whitelist() {
        let err = StateDefaults::try_from(&map(json!({"user_id": 9}))).unwrap_err();
        assert!(matches!(err, StorageError::InvalidDefaults(_)));
        let err = StateDefaults::try_from(&map(json!({"created": "2013-01-01"}))).unwrap_err();
        assert!(matches!(err, StorageError::InvalidDefaults(_)));
    }

    #[test]
    fn rejects_wrong_types() {
        let err = StateDefaults::try_from(&map(json!({"grade": "high"}))).unwrap_err();
        assert!(err.to_string().contains("must be a number"));
    }
}
