//! Router and facade behaviour over real backends.

use std::collections::BTreeMap;
use std::sync::Arc;

use tempfile::TempDir;

use coursestate_document::{DocumentBackend, MemoryCollection};
use coursestate_routing::{BackendRouter, Route, StateFacade, StorageConfig};
use coursestate_storage::conformance::run_conformance_suite;
use coursestate_storage::{StateRecord, StateStorage, StorageError};

const FALL: &str = "MITx/6.002x/2012_Fall";
const SPRING: &str = "MITx/6.002x/2013_Spring";

async fn memory_backend(name: &str) -> Arc<dyn StateStorage> {
    Arc::new(
        DocumentBackend::new(MemoryCollection::new(name))
            .await
            .expect("backend"),
    )
}

fn config(multi_engine: bool) -> StorageConfig {
    StorageConfig::from_toml_str(&format!(
        r#"
multi_engine = {multi_engine}

[course_storage]
"{FALL}" = "shard"
"{SPRING}" = "ghost"

[engines.shard]
type = "document"
host = "localhost"
db = "xmodule"
"#
    ))
    .unwrap()
}

async fn router(multi_engine: bool) -> BackendRouter {
    let mut engines = BTreeMap::new();
    engines.insert("shard".to_string(), memory_backend("shard").await);
    BackendRouter::with_backends(config(multi_engine), memory_backend("default").await, engines)
}

#[tokio::test]
async fn disabled_multi_engine_routes_everything_to_default() {
    let router = router(false).await;
    assert_eq!(router.route_for_course(FALL), Route::Default);
    assert_eq!(router.route_for_course("any/other/course"), Route::Default);
    assert_eq!(
        router.backend_for_course(FALL).describe(),
        "DocumentBackend(memory:default)"
    );
}

#[tokio::test]
async fn mapped_course_routes_to_its_engine() {
    let router = router(true).await;
    assert_eq!(router.route_for_course(FALL), Route::Engine("shard".into()));
    assert_eq!(
        router.backend_for_course(FALL).describe(),
        "DocumentBackend(memory:shard)"
    );
}

#[tokio::test]
async fn undefined_engine_and_unmapped_course_fail_open() {
    let router = router(true).await;
    // Mapped to an engine with no [engines.ghost] entry.
    assert_eq!(router.route_for_course(SPRING), Route::Default);
    // No mapping and no [engines.default] entry.
    assert_eq!(router.route_for_course("HarvardX/CS50/2013"), Route::Default);
    assert_eq!(
        router.backend_for_course(SPRING).describe(),
        "DocumentBackend(memory:default)"
    );
}

#[tokio::test]
async fn facade_writes_land_in_the_routed_backend() {
    let router = Arc::new(router(true).await);
    let facade = StateFacade::new(Arc::clone(&router));

    facade
        .save(&StateRecord::new(FALL, 7, "i4x://p1").with_state("{}"))
        .await
        .unwrap();

    let shard = router.backend_for_course(FALL);
    assert!(shard.get(FALL, 7, "i4x://p1").await.is_ok());
    let default = router.default_backend();
    assert!(matches!(
        default.get(FALL, 7, "i4x://p1").await,
        Err(StorageError::NotFound { .. })
    ));

    facade
        .delete(&StateRecord::new(FALL, 7, "i4x://p1"))
        .await
        .unwrap();
    assert!(shard.get(FALL, 7, "i4x://p1").await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn facade_conformance() {
    let report = run_conformance_suite(|| async {
        let default = memory_backend("default").await;
        StateFacade::new(Arc::new(BackendRouter::with_backends(
            StorageConfig::default(),
            default,
            BTreeMap::new(),
        )))
    })
    .await;
    assert!(report.is_clean(), "{report}");
}

// ── connect ───────────────────────────────────────────────────────────────────

fn sqlite_url(dir: &TempDir, name: &str) -> String {
    format!("sqlite://{}", dir.path().join(name).display())
}

#[tokio::test]
async fn connect_requires_default_database() {
    let config = StorageConfig::from_toml_str("multi_engine = false").unwrap();
    let err = BackendRouter::connect(config).await.err().unwrap();
    assert!(matches!(err, StorageError::Config(_)), "{err}");
}

#[tokio::test]
async fn connect_builds_sql_engines_and_fails_open_on_bad_entries() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::from_toml_str(&format!(
        r#"
multi_engine = true

[databases]
default = "{default}"
archive = "{archive}"

[course_storage]
"{FALL}" = "archive"
"{SPRING}" = "cassandra"
"HarvardX/CS50/2013" = "headless"

[engines.default]
type = "sql"
db = "default"

[engines.archive]
type = "sql"
db = "archive"

[engines.cassandra]
type = "cassandra"

[engines.headless]
type = "document"
db = "xmodule"
"#,
        default = sqlite_url(&dir, "state.db"),
        archive = sqlite_url(&dir, "archive.db"),
    ))
    .unwrap();

    let router = BackendRouter::connect(config).await.unwrap();
    assert_eq!(
        router.backend_for_course(FALL).describe(),
        "RelationalBackend(archive)"
    );
    // Unknown type and a document engine without a host both fall back.
    assert_eq!(
        router.backend_for_course(SPRING).describe(),
        "RelationalBackend(default)"
    );
    assert_eq!(
        router.backend_for_course("HarvardX/CS50/2013").describe(),
        "RelationalBackend(default)"
    );
    // Unmapped courses use [engines.default], which shares the default pool.
    assert_eq!(
        router.backend_for_course("any/other/course").describe(),
        "RelationalBackend(default)"
    );

    let facade = StateFacade::new(Arc::new(router));
    facade
        .save(&StateRecord::new(FALL, 1, "i4x://p1").with_state("archived"))
        .await
        .unwrap();
    facade
        .save(&StateRecord::new("any/other/course", 1, "i4x://p1"))
        .await
        .unwrap();
    let rec = facade.get(FALL, 1, "i4x://p1").await.unwrap();
    assert_eq!(rec.state.as_deref(), Some("archived"));
    assert!(facade
        .router()
        .default_backend()
        .get(FALL, 1, "i4x://p1")
        .await
        .is_err());
}

#[tokio::test]
async fn sql_engine_with_unknown_alias_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::from_toml_str(&format!(
        r#"
multi_engine = true

[databases]
default = "{default}"

[course_storage]
"{FALL}" = "lost"

[engines.lost]
type = "sql"
db = "nowhere"
"#,
        default = sqlite_url(&dir, "state.db"),
    ))
    .unwrap();

    let router = BackendRouter::connect(config).await.unwrap();
    assert_eq!(router.route_for_course(FALL), Route::Default);
    assert_eq!(
        router.backend_for_course(FALL).describe(),
        "RelationalBackend(default)"
    );
}

#[tokio::test]
async fn unreachable_engine_fails_connect_instead_of_falling_back() {
    let dir = tempfile::tempdir().unwrap();
    let unreachable = dir.path().join("missing_dir").join("archive.db");
    let config = StorageConfig::from_toml_str(&format!(
        r#"
multi_engine = true

[databases]
default = "{default}"
archive = "sqlite://{archive}"

[course_storage]
"{FALL}" = "archive"

[engines.archive]
type = "sql"
db = "archive"
"#,
        default = sqlite_url(&dir, "state.db"),
        archive = unreachable.display(),
    ))
    .unwrap();

    let err = BackendRouter::connect(config).await.err().unwrap();
    assert!(matches!(err, StorageError::Backend(_)), "{err}");
    assert!(err.to_string().contains("archive"), "{err}");
}

#[tokio::test]
async fn route_agrees_with_the_backend_handed_out() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::from_toml_str(&format!(
        r#"
multi_engine = true

[databases]
default = "{default}"
archive = "{archive}"

[course_storage]
"{FALL}" = "archive"
"{SPRING}" = "broken"

[engines.archive]
type = "sql"
db = "archive"

[engines.broken]
type = "sql"
"#,
        default = sqlite_url(&dir, "state.db"),
        archive = sqlite_url(&dir, "archive.db"),
    ))
    .unwrap();

    let router = BackendRouter::connect(config).await.unwrap();
    for course in [FALL, SPRING, "any/other/course"] {
        let expected = match router.route_for_course(course) {
            Route::Default => "RelationalBackend(default)".to_string(),
            Route::Engine(name) => format!("RelationalBackend({name})"),
        };
        assert_eq!(router.backend_for_course(course).describe(), expected, "{course}");
    }
    assert_eq!(router.route_for_course(FALL), Route::Engine("archive".into()));
    assert_eq!(router.route_for_course(SPRING), Route::Default);
}
