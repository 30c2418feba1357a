use std::collections::BTreeMap;
use std::sync::Arc;

use coursestate_document::{DocumentBackend, MongoParams};
use coursestate_sql::RelationalBackend;
use coursestate_storage::{StateStorage, StorageError};

use crate::config::{EngineConfig, EngineKind, StorageConfig, DEFAULT_DATABASE, DEFAULT_ENGINE};

/// Which backend serves a course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// The default relational backend.
    Default,
    /// A named `[engines.*]` entry.
    Engine(String),
}

/// Maps each course to the backend that stores its state.
///
/// Backends are built once, when the router is constructed, and shared by
/// every caller. Relational backends share one pool per database alias.
///
/// Routing fails open only on configuration: a course whose engine is
/// undefined or misconfigured is served by the default backend, and each
/// such engine is reported with a warning at construction.
pub struct BackendRouter {
    config: StorageConfig,
    default: Arc<dyn StateStorage>,
    engines: BTreeMap<String, Arc<dyn StateStorage>>,
}

impl BackendRouter {
    /// Build every configured backend.
    ///
    /// The default database is mandatory: if it is missing or cannot be
    /// opened the router is not built. A misconfigured engine (unknown type,
    /// missing parameters, unknown database alias) is skipped with a
    /// warning and its courses use the default backend. A well-formed engine
    /// whose store cannot be reached fails the whole construction, so its
    /// courses are never served from another store.
    pub async fn connect(config: StorageConfig) -> Result<Self, StorageError> {
        let default_url = config.default_database_url()?;
        let default = RelationalBackend::connect(DEFAULT_DATABASE, default_url).await?;

        let mut relational: BTreeMap<String, RelationalBackend> = BTreeMap::new();
        relational.insert(DEFAULT_DATABASE.to_string(), default.clone());

        let mut engines: BTreeMap<String, Arc<dyn StateStorage>> = BTreeMap::new();
        if config.multi_engine {
            for (name, engine) in &config.engines {
                let target = match resolve_engine(engine, &config) {
                    Ok(target) => target,
                    Err(reason) => {
                        tracing::warn!(
                            engine = %name,
                            %reason,
                            "storage engine misconfigured; its courses use the default backend"
                        );
                        continue;
                    }
                };
                let backend = open_engine(target, &mut relational).await.map_err(|e| {
                    StorageError::Backend(format!("storage engine '{name}' could not be opened: {e}"))
                })?;
                tracing::info!(engine = %name, backend = %backend.describe(), "storage engine ready");
                engines.insert(name.clone(), backend);
            }
            warn_unknown_engines(&config);
        }

        Ok(Self {
            config,
            default: Arc::new(default),
            engines,
        })
    }

    /// Build a router over backends constructed elsewhere.
    pub fn with_backends(
        config: StorageConfig,
        default: Arc<dyn StateStorage>,
        engines: BTreeMap<String, Arc<dyn StateStorage>>,
    ) -> Self {
        if config.multi_engine {
            warn_unknown_engines(&config);
        }
        Self {
            config,
            default,
            engines,
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Which backend serves `course_id`. Courses mapped to an undefined or
    /// misconfigured engine resolve to [`Route::Default`].
    pub fn route_for_course(&self, course_id: &str) -> Route {
        if !self.config.multi_engine {
            return Route::Default;
        }
        let name = self
            .config
            .course_storage
            .get(course_id)
            .map(String::as_str)
            .unwrap_or(DEFAULT_ENGINE);
        if self.engines.contains_key(name) {
            Route::Engine(name.to_string())
        } else {
            Route::Default
        }
    }

    pub fn backend_for_course(&self, course_id: &str) -> Arc<dyn StateStorage> {
        match self.route_for_course(course_id) {
            Route::Default => Arc::clone(&self.default),
            Route::Engine(name) => self
                .engines
                .get(&name)
                .map(Arc::clone)
                .unwrap_or_else(|| Arc::clone(&self.default)),
        }
    }

    pub fn default_backend(&self) -> Arc<dyn StateStorage> {
        Arc::clone(&self.default)
    }
}

/// A well-formed engine entry, ready to be opened.
enum EngineTarget {
    Sql { alias: String, url: String },
    Document(MongoParams),
}

/// Check an engine entry against the configuration without touching any store.
fn resolve_engine(engine: &EngineConfig, config: &StorageConfig) -> Result<EngineTarget, String> {
    match engine.kind {
        EngineKind::Sql => {
            let alias = engine.db.as_deref().ok_or("sql engine has no db alias")?;
            let url = config
                .databases
                .get(alias)
                .ok_or_else(|| format!("unknown database alias '{alias}'"))?;
            Ok(EngineTarget::Sql {
                alias: alias.to_string(),
                url: url.clone(),
            })
        }
        EngineKind::Document => Ok(EngineTarget::Document(engine.mongo_params()?)),
        EngineKind::Unknown => Err("unknown engine type".to_string()),
    }
}

async fn open_engine(
    target: EngineTarget,
    relational: &mut BTreeMap<String, RelationalBackend>,
) -> Result<Arc<dyn StateStorage>, StorageError> {
    match target {
        EngineTarget::Sql { alias, url } => {
            if let Some(backend) = relational.get(&alias) {
                return Ok(Arc::new(backend.clone()));
            }
            let backend = RelationalBackend::connect(&alias, &url).await?;
            relational.insert(alias, backend.clone());
            Ok(Arc::new(backend))
        }
        EngineTarget::Document(params) => Ok(Arc::new(DocumentBackend::connect(&params).await?)),
    }
}

fn warn_unknown_engines(config: &StorageConfig) {
    for (course_id, name) in &config.course_storage {
        if !config.engines.contains_key(name) {
            tracing::warn!(
                course_id = %course_id,
                engine = %name,
                "course mapped to an undefined engine; using the default backend"
            );
        }
    }
}
