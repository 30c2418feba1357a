//! Text and JSON rendering of command results.

use coursestate_storage::timestamp::format_timestamp;
use coursestate_storage::StateRecord;
use serde::Serialize;
use time::OffsetDateTime;

use crate::OutputFormat;

pub(crate) fn print_record(record: &StateRecord, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(record),
        OutputFormat::Text => print!("{}", record_text(record)),
    }
}

pub(crate) fn print_records(records: &[StateRecord], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(records),
        OutputFormat::Text => {
            println!("{} record(s)", records.len());
            for record in records {
                println!();
                print!("{}", record_text(record));
            }
        }
    }
}

pub(crate) fn print_deleted(record: &StateRecord, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "deleted": record.key() })),
        OutputFormat::Text => println!("deleted {}", record.key()),
    }
}

pub(crate) fn print_route(course_id: &str, engine: Option<&str>, backend: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "course_id": course_id,
            "engine": engine,
            "backend": backend,
        })),
        OutputFormat::Text => {
            println!("course:  {}", course_id);
            println!("engine:  {}", engine.unwrap_or("(default)"));
            println!("backend: {}", backend);
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("error: could not serialize output: {}", e),
    }
}

fn record_text(record: &StateRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("key:         {}\n", record.key()));
    out.push_str(&format!("module_type: {}\n", record.module_type));
    out.push_str(&format!("state:       {}\n", record.state.as_deref().unwrap_or("-")));
    out.push_str(&format!("grade:       {}\n", number(record.grade)));
    out.push_str(&format!("max_grade:   {}\n", number(record.max_grade)));
    out.push_str(&format!("done:        {}\n", record.done.code()));
    out.push_str(&format!("created:     {}\n", timestamp(record.created)));
    out.push_str(&format!("modified:    {}\n", timestamp(record.modified)));
    out
}

fn number(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn timestamp(value: Option<OffsetDateTime>) -> String {
    value
        .and_then(|ts| format_timestamp(ts).ok())
        .unwrap_or_else(|| "-".to_string())
}
