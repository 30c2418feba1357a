use std::future::Future;
use std::sync::Arc;

use super::{keys, make_record, CaseOutcome, COURSE, USER};
use crate::{StateDefaults, StateStorage, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 8;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<CaseOutcome>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(CaseOutcome::check(
        "concurrent",
        "concurrent_get_or_create_yields_one_record",
        concurrent_get_or_create_yields_one_record(factory).await,
    ));
    results.push(CaseOutcome::check(
        "concurrent",
        "concurrent_saves_different_keys_all_succeed",
        concurrent_saves_different_keys_all_succeed(factory).await,
    ));

    results
}

// ── Concurrent get_or_create: one record ────────────────────────────────────

/// N tasks race `get_or_create` on the same key, each with different
/// defaults. Exactly one record must exist afterwards, and every task that
/// succeeded must have seen that record. Tasks may lose with
/// `UniquenessConflict` on backends without an atomic create; any other
/// error fails the test.
async fn concurrent_get_or_create_yields_one_record<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let defaults = StateDefaults::new().state(format!("writer-{i}"));
            match s.get_or_create(COURSE, USER, "i4x://race", &defaults).await {
                Ok(rec) => Ok(Some(rec)),
                Err(StorageError::UniquenessConflict { .. }) => Ok(None),
                Err(e) => Err(e),
            }
        }));
    }

    let mut seen = Vec::new();
    for handle in handles {
        let outcome = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if let Some(rec) = outcome {
            seen.push(rec);
        }
    }

    if seen.is_empty() {
        return Err("no task obtained a record".to_string());
    }

    let stored = storage
        .get_batch(COURSE, USER, &keys(&["i4x://race"]))
        .await
        .map_err(|e| e.to_string())?;
    if stored.len() != 1 {
        return Err(format!("expected exactly 1 record, got {}", stored.len()));
    }
    for rec in &seen {
        if rec.state != stored[0].state {
            return Err(format!(
                "a task saw {:?} but the store holds {:?}",
                rec.state, stored[0].state
            ));
        }
    }
    Ok(())
}

// ── Concurrent saves to different keys: all succeed ─────────────────────────

async fn concurrent_saves_different_keys_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            s.save(&make_record(&format!("i4x://p{i}"), &format!("state-{i}")))
                .await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
    }

    let requested = (0..N).map(|i| format!("i4x://p{i}")).collect();
    let stored = storage
        .get_batch(COURSE, USER, &requested)
        .await
        .map_err(|e| e.to_string())?;
    if stored.len() != N {
        return Err(format!("expected {N} records, got {}", stored.len()));
    }
    Ok(())
}
