//! Storage collaborators: a versioned key-value store for metadata and an
//! object store for file bytes.

pub mod memory;
pub mod postgres;
pub mod s3;

use actix_web::web::Bytes;
use async_trait::async_trait;

use crate::utils::range::ByteRange;

pub use memory::{MemoryKvStore, MemoryObjectStore};
pub use postgres::PgKvStore;
pub use s3::S3ObjectStore;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("malformed record under {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("gave up updating {0} after repeated concurrent writes")]
    Contention(String),

    #[error("requested range is not satisfiable")]
    RangeNotSatisfiable,
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// A stored value together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub value: String,
    pub version: u64,
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Versioned>, StorageError>;

    async fn put(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Writes `value` only if the entry is still at `expected_version`
    /// (`None` meaning the key must be absent). Returns whether it was written.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected_version: Option<u64>,
        value: String,
    ) -> Result<bool, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Keys starting with `prefix`, in lexicographic order.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError>;

    /// Whole object when `range` is `None`, otherwise exactly the inclusive span.
    async fn get(&self, key: &str, range: Option<ByteRange>) -> Result<Option<Bytes>, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}
