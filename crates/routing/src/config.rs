//! Storage configuration.
//!
//! # Example
//!
//! ```toml
//! multi_engine = true
//!
//! [databases]
//! default = "sqlite://state.db"
//!
//! [course_storage]
//! "MITx/6.002x/2012_Fall" = "mongo_shard"
//!
//! [engines.default]
//! type = "sql"
//! db = "default"
//!
//! [engines.mongo_shard]
//! type = "document"
//! host = "localhost"
//! db = "xmodule"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use coursestate_document::{MongoParams, DEFAULT_COLLECTION, DEFAULT_PORT};
use coursestate_storage::StorageError;

/// Database alias backing the mandatory default relational backend.
pub const DEFAULT_DATABASE: &str = "default";

/// Engine name used for courses without a `course_storage` entry.
pub const DEFAULT_ENGINE: &str = "default";

/// Immutable storage configuration handed to the router.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// When false every course uses the default backend.
    #[serde(default)]
    pub multi_engine: bool,
    /// Database alias to `sqlite://` URL.
    #[serde(default)]
    pub databases: BTreeMap<String, String>,
    /// Course id to engine name.
    #[serde(default)]
    pub course_storage: BTreeMap<String, String>,
    /// Engine name to engine definition.
    #[serde(default)]
    pub engines: BTreeMap<String, EngineConfig>,
}

/// Storage engine selected by an `[engines.*]` entry's `type`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Sql,
    #[serde(alias = "mongo")]
    Document,
    /// Missing or unrecognised type; routed to the default backend.
    #[default]
    #[serde(other)]
    Unknown,
}

/// One `[engines.*]` entry. Which fields matter depends on `kind`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(rename = "type", default)]
    pub kind: EngineKind,
    /// Database alias (sql) or database name (document).
    pub db: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub collection: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl StorageConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, StorageError> {
        toml::from_str(content)
            .map_err(|e| StorageError::Config(format!("could not parse storage config: {e}")))
    }

    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StorageError::Config(format!("could not read '{}': {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// URL of the default database, which every configuration must name.
    pub fn default_database_url(&self) -> Result<&str, StorageError> {
        self.databases
            .get(DEFAULT_DATABASE)
            .map(String::as_str)
            .ok_or_else(|| {
                StorageError::Config(format!(
                    "no '{DEFAULT_DATABASE}' entry under [databases]"
                ))
            })
    }
}

impl EngineConfig {
    /// Connection parameters for a document engine.
    pub fn mongo_params(&self) -> Result<MongoParams, String> {
        let host = self.host.as_deref().ok_or("document engine has no host")?;
        let db = self.db.as_deref().ok_or("document engine has no db")?;
        let mut params = MongoParams::new(host, db);
        params.port = self.port.unwrap_or(DEFAULT_PORT);
        params.collection = self
            .collection
            .clone()
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string());
        params.user = self.user.clone();
        params.password = self.password.clone();
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
multi_engine = true

[databases]
default = "sqlite://state.db"
archive = "sqlite://archive.db"

[course_storage]
"MITx/6.002x/2012_Fall" = "mongo_shard"
"HarvardX/CS50/2013" = "archive"

[engines.default]
type = "sql"
db = "default"

[engines.archive]
type = "sql"
db = "archive"

[engines.mongo_shard]
type = "mongo"
host = "localhost"
db = "xmodule"
"#;

    #[test]
    fn parses_full_config() {
        let config = StorageConfig::from_toml_str(SAMPLE).unwrap();
        assert!(config.multi_engine);
        assert_eq!(config.databases.len(), 2);
        assert_eq!(
            config.course_storage["MITx/6.002x/2012_Fall"],
            "mongo_shard"
        );
        assert_eq!(config.engines["archive"].kind, EngineKind::Sql);
        assert_eq!(config.engines["mongo_shard"].kind, EngineKind::Document);
        assert_eq!(config.default_database_url().unwrap(), "sqlite://state.db");
    }

    #[test]
    fn mongo_params_fill_defaults() {
        let config = StorageConfig::from_toml_str(SAMPLE).unwrap();
        let params = config.engines["mongo_shard"].mongo_params().unwrap();
        assert_eq!(params.host, "localhost");
        assert_eq!(params.port, 27017);
        assert_eq!(params.db, "xmodule");
        assert_eq!(params.collection, "studentstate");
        assert!(params.user.is_none());
    }

    #[test]
    fn mongo_params_require_host_and_db() {
        let engine = EngineConfig {
            kind: EngineKind::Document,
            db: Some("xmodule".into()),
            ..Default::default()
        };
        assert!(engine.mongo_params().unwrap_err().contains("host"));
    }

    #[test]
    fn unknown_or_missing_type_parses_as_unknown() {
        let config = StorageConfig::from_toml_str(
            r#"
[engines.a]
type = "cassandra"

[engines.b]
db = "default"
"#,
        )
        .unwrap();
        assert_eq!(config.engines["a"].kind, EngineKind::Unknown);
        assert_eq!(config.engines["b"].kind, EngineKind::Unknown);
    }

    #[test]
    fn empty_config_is_single_engine() {
        let config = StorageConfig::from_toml_str("").unwrap();
        assert!(!config.multi_engine);
        assert!(matches!(
            config.default_database_url(),
            Err(StorageError::Config(_))
        ));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = StorageConfig::from_toml_str("multi_engine = [").unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }
}
