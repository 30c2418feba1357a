//! Runs the shared `StateStorage` conformance suite against the document
//! backend over an in-process collection.

use coursestate_document::{DocumentBackend, MemoryCollection};
use coursestate_storage::conformance::run_conformance_suite;

async fn memory_backend() -> DocumentBackend<MemoryCollection> {
    DocumentBackend::new(MemoryCollection::new("studentstate"))
        .await
        .expect("backend")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn document_backend_conformance() {
    let report = run_conformance_suite(memory_backend).await;
    assert!(report.is_clean(), "{report}");
}
