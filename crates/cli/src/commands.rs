use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use coursestate_routing::{Route, StateFacade, StorageConfig};
use coursestate_storage::{DoneStatus, StateDefaults, StateRecord, StateStorage};

use crate::output;
use crate::{Commands, OutputFormat};

pub(crate) async fn run(
    config_path: &Path,
    command: Commands,
    format: OutputFormat,
) -> Result<(), String> {
    let config = StorageConfig::load(config_path).map_err(|e| e.to_string())?;
    tracing::debug!(config = %config_path.display(), multi_engine = config.multi_engine, "loaded storage config");
    let facade = StateFacade::connect(config)
        .await
        .map_err(|e| e.to_string())?;

    match command {
        Commands::Get { key } => {
            let record = facade
                .get(&key.course_id, key.user_id, &key.module_state_key)
                .await
                .map_err(|e| e.to_string())?;
            output::print_record(&record, format);
        }
        Commands::GetOrCreate { key, defaults } => {
            let defaults = parse_defaults(defaults.as_deref())?;
            let record = facade
                .get_or_create(&key.course_id, key.user_id, &key.module_state_key, &defaults)
                .await
                .map_err(|e| e.to_string())?;
            output::print_record(&record, format);
        }
        Commands::Batch {
            course_id,
            user_id,
            module_state_keys,
        } => {
            let keys: BTreeSet<String> = module_state_keys.into_iter().collect();
            let records = facade
                .get_batch(&course_id, user_id, &keys)
                .await
                .map_err(|e| e.to_string())?;
            output::print_records(&records, format);
        }
        Commands::Save {
            key,
            module_type,
            state,
            grade,
            max_grade,
            done,
        } => {
            let mut record = StateRecord::new(key.course_id, key.user_id, key.module_state_key)
                .with_module_type(module_type);
            record.state = state;
            record.grade = grade;
            record.max_grade = max_grade;
            if let Some(done) = done {
                record.done = DoneStatus::from_str(&done).map_err(|e| e.to_string())?;
            }
            let stored = facade.save(&record).await.map_err(|e| e.to_string())?;
            output::print_record(&stored, format);
        }
        Commands::Delete { key } => {
            let record = StateRecord::new(key.course_id, key.user_id, key.module_state_key);
            facade.delete(&record).await.map_err(|e| e.to_string())?;
            output::print_deleted(&record, format);
        }
        Commands::Route { course_id } => {
            let route = facade.router().route_for_course(&course_id);
            let backend = facade.router().backend_for_course(&course_id).describe();
            let engine = match route {
                Route::Default => None,
                Route::Engine(name) => Some(name),
            };
            output::print_route(&course_id, engine.as_deref(), &backend, format);
        }
    }
    Ok(())
}

fn parse_defaults(raw: Option<&str>) -> Result<StateDefaults, String> {
    let Some(raw) = raw else {
        return Ok(StateDefaults::default());
    };
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| format!("invalid --defaults JSON: {}", e))?;
    let map = value
        .as_object()
        .ok_or_else(|| "--defaults must be a JSON object".to_string())?;
    StateDefaults::try_from(map).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_json_object() {
        let defaults =
            parse_defaults(Some(r#"{"module_type": "video", "grade": 1.0}"#)).unwrap();
        assert_eq!(defaults.grade, Some(1.0));
        assert!(parse_defaults(None).unwrap().is_empty());
    }

    #[test]
    fn defaults_reject_non_objects_and_unknown_fields() {
        assert!(parse_defaults(Some("[1]")).unwrap_err().contains("object"));
        assert!(parse_defaults(Some("{\"colour\": 1}")).is_err());
        assert!(parse_defaults(Some("{")).unwrap_err().contains("JSON"));
    }
}
