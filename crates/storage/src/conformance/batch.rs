use std::collections::BTreeSet;
use std::future::Future;

use super::{keys, make_record, CaseOutcome, COURSE, OTHER_COURSE, USER};
use crate::StateStorage;

pub(super) async fn run_batch_tests<S, F, Fut>(factory: &F) -> Vec<CaseOutcome>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(CaseOutcome::check(
        "batch",
        "batch_returns_only_existing",
        batch_returns_only_existing(factory).await,
    ));
    results.push(CaseOutcome::check(
        "batch",
        "batch_empty_key_set",
        batch_empty_key_set(factory).await,
    ));
    results.push(CaseOutcome::check(
        "batch",
        "batch_scoped_to_course_and_user",
        batch_scoped_to_course_and_user(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// Five keys requested, three stored: exactly those three come back once each.
async fn batch_returns_only_existing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for key in ["i4x://p1", "i4x://p3", "i4x://p5"] {
        s.save(&make_record(key, key))
            .await
            .map_err(|e| e.to_string())?;
    }

    let requested = keys(&["i4x://p5", "i4x://p4", "i4x://p3", "i4x://p2", "i4x://p1"]);
    let found = s
        .get_batch(COURSE, USER, &requested)
        .await
        .map_err(|e| e.to_string())?;

    if found.len() != 3 {
        return Err(format!("expected 3 records, got {}", found.len()));
    }
    let found_keys: BTreeSet<String> = found.iter().map(|r| r.module_state_key.clone()).collect();
    if found_keys != keys(&["i4x://p1", "i4x://p3", "i4x://p5"]) {
        return Err(format!("unexpected keys: {:?}", found_keys));
    }
    for rec in &found {
        if rec.state.as_deref() != Some(rec.module_state_key.as_str()) {
            return Err(format!("wrong payload for {}: {:?}", rec.module_state_key, rec.state));
        }
    }
    Ok(())
}

async fn batch_empty_key_set<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.save(&make_record("i4x://p1", "a"))
        .await
        .map_err(|e| e.to_string())?;
    let found = s
        .get_batch(COURSE, USER, &BTreeSet::new())
        .await
        .map_err(|e| e.to_string())?;
    if !found.is_empty() {
        return Err(format!("expected no records, got {}", found.len()));
    }
    Ok(())
}

async fn batch_scoped_to_course_and_user<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut other_user = make_record("i4x://p1", "other user");
    other_user.user_id = USER + 1;
    let mut other_course = make_record("i4x://p1", "other course");
    other_course.course_id = OTHER_COURSE.to_string();
    s.save(&other_user).await.map_err(|e| e.to_string())?;
    s.save(&other_course).await.map_err(|e| e.to_string())?;

    let found = s
        .get_batch(COURSE, USER, &keys(&["i4x://p1"]))
        .await
        .map_err(|e| e.to_string())?;
    if !found.is_empty() {
        return Err(format!("expected no records for this learner, got {:?}", found));
    }
    Ok(())
}
