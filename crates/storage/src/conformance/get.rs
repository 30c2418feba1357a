use std::future::Future;

use super::{make_record, same_payload, CaseOutcome, COURSE, OTHER_COURSE, USER};
use crate::{StateStorage, StorageError};

pub(super) async fn run_get_tests<S, F, Fut>(factory: &F) -> Vec<CaseOutcome>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(CaseOutcome::check(
        "get",
        "get_missing_returns_not_found",
        get_missing_returns_not_found(factory).await,
    ));
    results.push(CaseOutcome::check(
        "get",
        "not_found_has_correct_fields",
        not_found_has_correct_fields(factory).await,
    ));
    results.push(CaseOutcome::check(
        "get",
        "get_returns_saved_record",
        get_returns_saved_record(factory).await,
    ));
    results.push(CaseOutcome::check(
        "get",
        "records_isolated_by_course",
        records_isolated_by_course(factory).await,
    ));
    results.push(CaseOutcome::check(
        "get",
        "records_isolated_by_user",
        records_isolated_by_user(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn get_missing_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get(COURSE, USER, "i4x://missing").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

async fn not_found_has_correct_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get(COURSE, USER, "i4x://missing").await {
        Err(StorageError::NotFound {
            course_id,
            user_id,
            module_state_key,
            ..
        }) => {
            if course_id != COURSE || user_id != USER || module_state_key != "i4x://missing" {
                return Err(format!(
                    "wrong fields: course_id={course_id}, user_id={user_id}, \
                     module_state_key={module_state_key}"
                ));
            }
            Ok(())
        }
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

async fn get_returns_saved_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let rec = make_record("i4x://p1", r#"{"attempts":1}"#);
    s.save(&rec).await.map_err(|e| e.to_string())?;

    let got = s
        .get(COURSE, USER, "i4x://p1")
        .await
        .map_err(|e| e.to_string())?;
    same_payload(&rec, &got)
}

/// The same (user, key) in two courses are two records.
async fn records_isolated_by_course<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.save(&make_record("i4x://p1", "a"))
        .await
        .map_err(|e| e.to_string())?;

    match s.get(OTHER_COURSE, USER, "i4x://p1").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!(
            "expected NotFound in the other course, got {:?}",
            other
        )),
    }
}

async fn records_isolated_by_user<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mine = make_record("i4x://p1", "mine");
    let mut theirs = make_record("i4x://p1", "theirs");
    theirs.user_id = USER + 1;
    s.save(&mine).await.map_err(|e| e.to_string())?;
    s.save(&theirs).await.map_err(|e| e.to_string())?;

    let got = s
        .get(COURSE, USER, "i4x://p1")
        .await
        .map_err(|e| e.to_string())?;
    same_payload(&mine, &got)?;
    let got = s
        .get(COURSE, USER + 1, "i4x://p1")
        .await
        .map_err(|e| e.to_string())?;
    same_payload(&theirs, &got)
}
