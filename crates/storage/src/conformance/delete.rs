use std::future::Future;

use super::{make_record, same_payload, CaseOutcome, COURSE, USER};
use crate::{StateRecord, StateStorage, StorageError};

pub(super) async fn run_delete_tests<S, F, Fut>(factory: &F) -> Vec<CaseOutcome>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(CaseOutcome::check(
        "delete",
        "delete_then_get_returns_not_found",
        delete_then_get_returns_not_found(factory).await,
    ));
    results.push(CaseOutcome::check(
        "delete",
        "delete_missing_returns_not_found",
        delete_missing_returns_not_found(factory).await,
    ));
    results.push(CaseOutcome::check(
        "delete",
        "delete_only_removes_matching_record",
        delete_only_removes_matching_record(factory).await,
    ));
    results.push(CaseOutcome::check(
        "delete",
        "deleted_key_can_be_recreated",
        deleted_key_can_be_recreated(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn delete_then_get_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let rec = s
        .save(&make_record("i4x://p1", "a"))
        .await
        .map_err(|e| e.to_string())?;
    s.delete(&rec).await.map_err(|e| e.to_string())?;

    match s.get(COURSE, USER, "i4x://p1").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound after delete, got {:?}", other)),
    }
}

async fn delete_missing_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.delete(&StateRecord::new(COURSE, USER, "i4x://missing")).await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

async fn delete_only_removes_matching_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let doomed = make_record("i4x://p1", "doomed");
    let kept = make_record("i4x://p2", "kept");
    s.save(&doomed).await.map_err(|e| e.to_string())?;
    s.save(&kept).await.map_err(|e| e.to_string())?;

    s.delete(&doomed).await.map_err(|e| e.to_string())?;

    let got = s
        .get(COURSE, USER, "i4x://p2")
        .await
        .map_err(|e| format!("unrelated record lost: {e}"))?;
    same_payload(&kept, &got)
}

async fn deleted_key_can_be_recreated<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let rec = make_record("i4x://p1", "first life");
    s.save(&rec).await.map_err(|e| e.to_string())?;
    s.delete(&rec).await.map_err(|e| e.to_string())?;

    let reborn = make_record("i4x://p1", "second life");
    s.save(&reborn).await.map_err(|e| e.to_string())?;
    let got = s
        .get(COURSE, USER, "i4x://p1")
        .await
        .map_err(|e| e.to_string())?;
    same_payload(&reborn, &got)
}
