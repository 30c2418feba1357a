//! Runs the shared `StateStorage` conformance suite against SQLite.

mod common;

use coursestate_storage::conformance::run_conformance_suite;

use common::TempBackend;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn relational_backend_conformance() {
    let report = run_conformance_suite(TempBackend::new).await;
    assert!(report.is_clean(), "{report}");
}
