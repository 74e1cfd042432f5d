use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use actix_web::web::Bytes;
use async_trait::async_trait;

use super::{KvStore, ObjectStore, StorageError, Versioned};
use crate::utils::range::ByteRange;

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Backend("in-memory store lock poisoned".to_string())
}

/// Process-local key-value store, used when no database is configured and in tests.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<BTreeMap<String, Versioned>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Versioned>, StorageError> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let version = entries.get(key).map_or(1, |entry| entry.version + 1);
        entries.insert(key.to_string(), Versioned { value, version });
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected_version: Option<u64>,
        value: String,
    ) -> Result<bool, StorageError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let current = entries.get(key).map(|entry| entry.version);
        if current != expected_version {
            return Ok(false);
        }
        let version = current.map_or(1, |v| v + 1);
        entries.insert(key.to_string(), Versioned { value, version });
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, (Bytes, String)>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .ok()
            .and_then(|objects| objects.get(key).map(|(_, content_type)| content_type.clone()))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
        let mut objects = self.objects.write().map_err(poisoned)?;
        objects.insert(key.to_string(), (body, content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str, range: Option<ByteRange>) -> Result<Option<Bytes>, StorageError> {
        let objects = self.objects.read().map_err(poisoned)?;
        let Some((body, _)) = objects.get(key) else {
            return Ok(None);
        };
        match range {
            None => Ok(Some(body.clone())),
            Some(range) => {
                let size = body.len() as u64;
                if range.start > range.end || range.start >= size {
                    return Err(StorageError::RangeNotSatisfiable);
                }
                // Same as S3: an end past the object is truncated.
                let end = range.end.min(size - 1);
                Ok(Some(body.slice(range.start as usize..=end as usize)))
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut objects = self.objects.write().map_err(poisoned)?;
        objects.remove(key);
        Ok(())
    }
}
