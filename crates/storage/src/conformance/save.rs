use std::future::Future;

use super::{make_record, same_payload, CaseOutcome, COURSE, USER};
use crate::{StateRecord, StateStorage};

pub(super) async fn run_save_tests<S, F, Fut>(factory: &F) -> Vec<CaseOutcome>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(CaseOutcome::check(
        "save",
        "save_then_get_roundtrips_payload",
        save_then_get_roundtrips_payload(factory).await,
    ));
    results.push(CaseOutcome::check(
        "save",
        "save_overwrites_existing_fields",
        save_overwrites_existing_fields(factory).await,
    ));
    results.push(CaseOutcome::check(
        "save",
        "save_replaces_whole_payload",
        save_replaces_whole_payload(factory).await,
    ));
    results.push(CaseOutcome::check(
        "save",
        "save_preserves_created_and_advances_modified",
        save_preserves_created_and_advances_modified(factory).await,
    ));
    results.push(CaseOutcome::check(
        "save",
        "save_keeps_one_record_per_key",
        save_keeps_one_record_per_key(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn save_then_get_roundtrips_payload<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let rec = make_record("i4x://p1", r#"{"student_answers":{"1_2_1":"42"}}"#)
        .with_module_type("problem");
    let saved = s.save(&rec).await.map_err(|e| e.to_string())?;
    same_payload(&rec, &saved)?;

    let got = s
        .get(COURSE, USER, "i4x://p1")
        .await
        .map_err(|e| e.to_string())?;
    same_payload(&rec, &got)?;
    if let (Some(created), Some(modified)) = (got.created, got.modified) {
        if modified < created {
            return Err(format!("modified {modified} is before created {created}"));
        }
    }
    Ok(())
}

async fn save_overwrites_existing_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.save(&make_record("i4x://p1", "before"))
        .await
        .map_err(|e| e.to_string())?;

    let updated = StateRecord::new(COURSE, USER, "i4x://p1")
        .with_module_type("timelimit")
        .with_state("after")
        .with_grade(2.0, 2.0);
    s.save(&updated).await.map_err(|e| e.to_string())?;

    let got = s
        .get(COURSE, USER, "i4x://p1")
        .await
        .map_err(|e| e.to_string())?;
    same_payload(&updated, &got)
}

/// Fields missing from the saved record are cleared, not merged.
async fn save_replaces_whole_payload<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.save(&make_record("i4x://p1", "before"))
        .await
        .map_err(|e| e.to_string())?;

    let cleared = StateRecord::new(COURSE, USER, "i4x://p1");
    s.save(&cleared).await.map_err(|e| e.to_string())?;

    let got = s
        .get(COURSE, USER, "i4x://p1")
        .await
        .map_err(|e| e.to_string())?;
    same_payload(&cleared, &got)
}

async fn save_preserves_created_and_advances_modified<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let first = s
        .save(&make_record("i4x://p1", "one"))
        .await
        .map_err(|e| e.to_string())?;
    let second = s
        .save(&make_record("i4x://p1", "two"))
        .await
        .map_err(|e| e.to_string())?;

    // Backends without timestamps leave both unset.
    if first.created.is_none() {
        return Ok(());
    }
    if first.created != second.created {
        return Err(format!(
            "created changed on update: {:?} -> {:?}",
            first.created, second.created
        ));
    }
    if second.modified < first.modified {
        return Err(format!(
            "modified went backwards: {:?} -> {:?}",
            first.modified, second.modified
        ));
    }
    Ok(())
}

async fn save_keeps_one_record_per_key<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for i in 0..3 {
        s.save(&make_record("i4x://p1", &format!("v{i}")))
            .await
            .map_err(|e| e.to_string())?;
    }
    let found = s
        .get_batch(COURSE, USER, &super::keys(&["i4x://p1"]))
        .await
        .map_err(|e| e.to_string())?;
    if found.len() != 1 {
        return Err(format!("expected 1 record, got {}", found.len()));
    }
    if found[0].state.as_deref() != Some("v2") {
        return Err(format!("expected last write to win, got {:?}", found[0].state));
    }
    Ok(())
}
