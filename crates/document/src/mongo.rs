use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, Credential, IndexOptions, ServerAddress};
use mongodb::{Client, Collection, IndexModel};

use coursestate_storage::{StateKey, StorageError};

use crate::collection::StateCollection;
use crate::document::StateDocument;

pub const DEFAULT_PORT: u16 = 27017;
pub const DEFAULT_COLLECTION: &str = "studentstate";

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

/// Connection parameters for a MongoDB state collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoParams {
    pub host: String,
    pub port: u16,
    pub db: String,
    pub collection: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl MongoParams {
    pub fn new(host: impl Into<String>, db: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            db: db.into(),
            collection: DEFAULT_COLLECTION.to_string(),
            user: None,
            password: None,
        }
    }
}

/// A MongoDB collection of [`StateDocument`]s.
#[derive(Debug, Clone)]
pub struct MongoCollection {
    collection: Collection<StateDocument>,
    label: String,
}

impl MongoCollection {
    /// Build a client for `params`. No round trip happens until the first
    /// operation.
    pub fn connect(params: &MongoParams) -> Result<Self, StorageError> {
        let mut options = ClientOptions::default();
        let address = ServerAddress::parse(format!("{}:{}", params.host, params.port))
            .map_err(|e| StorageError::Config(format!("invalid mongo host '{}': {e}", params.host)))?;
        options.hosts = vec![address];
        // Credentials only apply when both halves are configured.
        if let (Some(user), Some(password)) = (&params.user, &params.password) {
            options.credential = Some(
                Credential::builder()
                    .username(user.clone())
                    .password(password.clone())
                    .source(params.db.clone())
                    .build(),
            );
        }

        let client = Client::with_options(options).map_err(mongo_err)?;
        let collection = client
            .database(&params.db)
            .collection::<StateDocument>(&params.collection);
        Ok(Self {
            collection,
            label: format!(
                "mongodb://{}:{}/{}.{}",
                params.host, params.port, params.db, params.collection
            ),
        })
    }
}

fn key_filter(key: &StateKey) -> Document {
    doc! {
        "course_id": key.course_id.as_str(),
        "user_id": key.user_id,
        "module_state_key": key.module_state_key.as_str(),
    }
}

fn mongo_err(e: MongoError) -> StorageError {
    StorageError::Backend(e.to_string())
}

fn is_duplicate_key(e: &MongoError) -> bool {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(failure)) => failure.code == DUPLICATE_KEY,
        ErrorKind::Command(failure) => failure.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Map a write error, turning unique index violations into conflicts.
fn write_err(key: &StateKey, e: MongoError) -> StorageError {
    if is_duplicate_key(&e) {
        StorageError::conflict(key)
    } else {
        mongo_err(e)
    }
}

#[async_trait]
impl StateCollection for MongoCollection {
    async fn ensure_unique_index(&self) -> Result<(), StorageError> {
        let index = IndexModel::builder()
            .keys(doc! { "course_id": 1, "user_id": 1, "module_state_key": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection
            .create_index(index)
            .await
            .map_err(mongo_err)?;
        Ok(())
    }

    async fn find_one(&self, key: &StateKey) -> Result<Option<StateDocument>, StorageError> {
        self.collection
            .find_one(key_filter(key))
            .await
            .map_err(mongo_err)
    }

    async fn find_many(
        &self,
        course_id: &str,
        user_id: i64,
        module_state_keys: &[String],
    ) -> Result<Vec<StateDocument>, StorageError> {
        let keys: Vec<Bson> = module_state_keys
            .iter()
            .map(|k| Bson::String(k.clone()))
            .collect();
        let cursor = self
            .collection
            .find(doc! {
                "course_id": course_id,
                "user_id": user_id,
                "module_state_key": { "$in": keys },
            })
            .await
            .map_err(mongo_err)?;
        cursor.try_collect::<Vec<_>>().await.map_err(mongo_err)
    }

    async fn insert_one(&self, document: &StateDocument) -> Result<(), StorageError> {
        self.collection
            .insert_one(document)
            .await
            .map_err(|e| write_err(&document.key(), e))?;
        Ok(())
    }

    async fn replace_one_upsert(&self, document: &StateDocument) -> Result<(), StorageError> {
        let key = document.key();
        self.collection
            .find_one_and_replace(key_filter(&key), document)
            .upsert(true)
            .await
            .map_err(|e| write_err(&key, e))?;
        Ok(())
    }

    async fn delete_one(&self, key: &StateKey) -> Result<u64, StorageError> {
        let result = self
            .collection
            .delete_one(key_filter(key))
            .await
            .map_err(mongo_err)?;
        Ok(result.deleted_count)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_defaults() {
        let p = MongoParams::new("localhost", "xmodule");
        assert_eq!(p.port, 27017);
        assert_eq!(p.collection, "studentstate");
        assert!(p.user.is_none());
    }

    #[test]
    fn filter_uses_the_composite_key() {
        let filter = key_filter(&StateKey::new("MITx/6.002x", 5, "i4x://p1"));
        assert_eq!(filter.get_str("course_id").unwrap(), "MITx/6.002x");
        assert_eq!(filter.get_i64("user_id").unwrap(), 5);
        assert_eq!(filter.get_str("module_state_key").unwrap(), "i4x://p1");
    }

    #[tokio::test]
    async fn connect_is_lazy_and_labels_the_collection() {
        let c = MongoCollection::connect(&MongoParams::new("localhost", "xmodule")).unwrap();
        assert_eq!(c.describe(), "mongodb://localhost:27017/xmodule.studentstate");
    }
}
