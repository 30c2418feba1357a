//! Conformance test suite for `StateStorage` implementations.
//!
//! Backend-agnostic cases any `StateStorage` implementation should pass:
//!
//! - **get**: reads, missing records, key isolation
//! - **get_or_create**: creation from defaults, idempotence
//! - **batch**: partial matches, scoping, empty key sets
//! - **save**: upsert, overwrite, timestamp handling
//! - **delete**: removal and missing-record errors
//! - **concurrent**: racing creators on one key
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use coursestate_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn sqlite_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_backend().await
//!     }).await;
//!     assert!(report.is_clean(), "{report}");
//! }
//! ```

mod batch;
mod concurrent;
mod delete;
mod get;
mod get_or_create;
mod save;

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;

use crate::record::StateRecord;
use crate::StateStorage;

/// Outcome of one conformance case.
#[derive(Debug, Clone)]
pub struct CaseOutcome {
    /// Operation under test, e.g. "get_or_create".
    pub operation: &'static str,
    pub case: &'static str,
    /// Why the case failed; `None` when it passed.
    pub error: Option<String>,
}

impl CaseOutcome {
    fn check(operation: &'static str, case: &'static str, result: Result<(), String>) -> Self {
        Self {
            operation,
            case,
            error: result.err(),
        }
    }

    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// Every case outcome for one backend.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    /// `describe()` of the backend under test.
    pub backend: String,
    pub outcomes: Vec<CaseOutcome>,
}

impl ConformanceReport {
    pub fn failures(&self) -> impl Iterator<Item = &CaseOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// At least one case ran and none failed.
    pub fn is_clean(&self) -> bool {
        self.total() > 0 && self.failed() == 0
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} of {} cases failed",
            self.backend,
            self.failed(),
            self.total()
        )?;
        for o in self.failures() {
            writeln!(
                f,
                "  {}::{}: {}",
                o.operation,
                o.case,
                o.error.as_deref().unwrap_or_default()
            )?;
        }
        Ok(())
    }
}

/// Run every case against fresh backends from `factory`.
///
/// `factory` is called once per case, plus once to label the report, and
/// must return an empty store each time.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: StateStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let backend = factory().await.describe();
    let mut outcomes = Vec::new();

    outcomes.extend(get::run_get_tests(&factory).await);
    outcomes.extend(get_or_create::run_get_or_create_tests(&factory).await);
    outcomes.extend(batch::run_batch_tests(&factory).await);
    outcomes.extend(save::run_save_tests(&factory).await);
    outcomes.extend(delete::run_delete_tests(&factory).await);
    outcomes.extend(concurrent::run_concurrent_tests(&factory).await);

    ConformanceReport { backend, outcomes }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

const COURSE: &str = "MITx/6.002x/2012_Fall";
const OTHER_COURSE: &str = "HarvardX/CS50x/2012";
const USER: i64 = 42;

fn make_record(module_state_key: &str, state: &str) -> StateRecord {
    StateRecord::new(COURSE, USER, module_state_key)
        .with_state(state)
        .with_grade(1.0, 2.0)
}

fn keys(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|k| k.to_string()).collect()
}

/// Compare the payload fields every backend must round-trip.
fn same_payload(expected: &StateRecord, actual: &StateRecord) -> Result<(), String> {
    if expected.key() != actual.key() {
        return Err(format!("key mismatch: expected {}, got {}", expected.key(), actual.key()));
    }
    if expected.module_type != actual.module_type {
        return Err(format!(
            "module_type mismatch: expected {}, got {}",
            expected.module_type, actual.module_type
        ));
    }
    if expected.state != actual.state {
        return Err(format!(
            "state mismatch: expected {:?}, got {:?}",
            expected.state, actual.state
        ));
    }
    if expected.grade != actual.grade || expected.max_grade != actual.max_grade {
        return Err(format!(
            "grade mismatch: expected {:?}/{:?}, got {:?}/{:?}",
            expected.grade, expected.max_grade, actual.grade, actual.max_grade
        ));
    }
    Ok(())
}
