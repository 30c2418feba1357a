use std::future::Future;

use super::{make_record, same_payload, CaseOutcome, COURSE, USER};
use crate::{ModuleType, StateDefaults, StateStorage};

pub(super) async fn run_get_or_create_tests<S, F, Fut>(factory: &F) -> Vec<CaseOutcome>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(CaseOutcome::check(
        "get_or_create",
        "creates_record_from_defaults",
        creates_record_from_defaults(factory).await,
    ));
    results.push(CaseOutcome::check(
        "get_or_create",
        "created_record_is_persisted",
        created_record_is_persisted(factory).await,
    ));
    results.push(CaseOutcome::check(
        "get_or_create",
        "second_call_does_not_reapply_defaults",
        second_call_does_not_reapply_defaults(factory).await,
    ));
    results.push(CaseOutcome::check(
        "get_or_create",
        "existing_record_returned_unmodified",
        existing_record_returned_unmodified(factory).await,
    ));
    results.push(CaseOutcome::check(
        "get_or_create",
        "empty_defaults_create_problem_record",
        empty_defaults_create_problem_record(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn creates_record_from_defaults<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let defaults = StateDefaults::new()
        .module_type("video")
        .state(r#"{"position":0}"#);
    let rec = s
        .get_or_create(COURSE, USER, "i4x://v1", &defaults)
        .await
        .map_err(|e| e.to_string())?;

    if rec.module_type != ModuleType::Video {
        return Err(format!("expected module_type video, got {}", rec.module_type));
    }
    if rec.state.as_deref() != Some(r#"{"position":0}"#) {
        return Err(format!("expected defaults state, got {:?}", rec.state));
    }
    Ok(())
}

async fn created_record_is_persisted<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let defaults = StateDefaults::new().state("seed").grade(0.0).max_grade(5.0);
    let created = s
        .get_or_create(COURSE, USER, "i4x://p1", &defaults)
        .await
        .map_err(|e| e.to_string())?;

    let got = s
        .get(COURSE, USER, "i4x://p1")
        .await
        .map_err(|e| format!("created record not readable: {e}"))?;
    same_payload(&created, &got)
}

/// Calling twice with the same arguments yields the same record, and the
/// second call's defaults are ignored.
async fn second_call_does_not_reapply_defaults<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let first = s
        .get_or_create(COURSE, USER, "i4x://p1", &StateDefaults::new().state("first"))
        .await
        .map_err(|e| e.to_string())?;
    let second = s
        .get_or_create(COURSE, USER, "i4x://p1", &StateDefaults::new().state("second"))
        .await
        .map_err(|e| e.to_string())?;

    same_payload(&first, &second)?;
    if second.state.as_deref() != Some("first") {
        return Err(format!("defaults re-applied: state is {:?}", second.state));
    }
    if first.created.is_some() && first.created != second.created {
        return Err("created timestamp changed between calls".to_string());
    }
    Ok(())
}

async fn existing_record_returned_unmodified<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let saved = s
        .save(&make_record("i4x://p1", "saved"))
        .await
        .map_err(|e| e.to_string())?;
    let defaults = StateDefaults::new().module_type("html").state("ignored").grade(9.0);
    let got = s
        .get_or_create(COURSE, USER, "i4x://p1", &defaults)
        .await
        .map_err(|e| e.to_string())?;
    same_payload(&saved, &got)?;

    let stored = s
        .get(COURSE, USER, "i4x://p1")
        .await
        .map_err(|e| e.to_string())?;
    same_payload(&saved, &stored)
}

async fn empty_defaults_create_problem_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let rec = s
        .get_or_create(COURSE, USER, "i4x://p1", &StateDefaults::default())
        .await
        .map_err(|e| e.to_string())?;
    if rec.module_type != ModuleType::Problem {
        return Err(format!("expected problem, got {}", rec.module_type));
    }
    if rec.state.is_some() || rec.grade.is_some() || rec.max_grade.is_some() {
        return Err(format!("expected empty payload, got {:?}", rec));
    }
    Ok(())
}
