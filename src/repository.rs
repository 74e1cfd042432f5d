//! Typed access to folder and file metadata in the key-value store.
//!
//! Key layout:
//! - `folder:<id>` → [`Folder`]
//! - `files:<folderId>` → ordered `Vec<FileRecord>`
//! - `file:<fileId>` → [`StoredFile`]

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::file::{FileRecord, StoredFile};
use crate::models::folder::{Folder, FolderSummary};
use crate::store::{KvStore, StorageError};

const FOLDER_PREFIX: &str = "folder:";
const MAX_CAS_ATTEMPTS: usize = 16;

fn folder_key(folder_id: &str) -> String {
    format!("{}{}", FOLDER_PREFIX, folder_id)
}

fn files_key(folder_id: &str) -> String {
    format!("files:{}", folder_id)
}

fn file_key(file_id: &str) -> String {
    format!("file:{}", file_id)
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(|source| StorageError::Serialization {
        key: key.to_string(),
        source,
    })
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|source| StorageError::Serialization {
        key: key.to_string(),
        source,
    })
}

#[derive(Clone)]
pub struct FolderRepository {
    kv: Arc<dyn KvStore>,
}

impl FolderRepository {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.kv.get(key).await? {
            Some(entry) => decode(key, &entry.value).map(Some),
            None => Ok(None),
        }
    }

    pub async fn create_folder(&self, folder: &Folder) -> Result<(), StorageError> {
        let key = folder_key(&folder.id);
        self.kv.put(&key, encode(&key, folder)?).await
    }

    pub async fn get_folder(&self, folder_id: &str) -> Result<Option<Folder>, StorageError> {
        self.get_json(&folder_key(folder_id)).await
    }

    /// All folders, newest first.
    pub async fn list_folders(&self) -> Result<Vec<FolderSummary>, StorageError> {
        let mut folders = Vec::new();
        for key in self.kv.list_keys(FOLDER_PREFIX).await? {
            // Deleted between list and get: skip it.
            if let Some(folder) = self.get_json::<Folder>(&key).await? {
                folders.push(FolderSummary::from(&folder));
            }
        }
        folders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(folders)
    }

    pub async fn list_files(&self, folder_id: &str) -> Result<Vec<FileRecord>, StorageError> {
        Ok(self.get_json(&files_key(folder_id)).await?.unwrap_or_default())
    }

    pub async fn get_file(&self, file_id: &str) -> Result<Option<StoredFile>, StorageError> {
        self.get_json(&file_key(file_id)).await
    }

    /// Records the file metadata, then appends to the folder's file list.
    /// The metadata is removed again if the append fails, so a listed file
    /// always has a record to delete it through.
    pub async fn add_file(&self, file: &StoredFile) -> Result<(), StorageError> {
        let key = file_key(&file.record.id);
        self.kv.put(&key, encode(&key, file)?).await?;

        let record = file.record.clone();
        let appended = self
            .update_file_list(&file.record.folder_id, move |files| files.push(record.clone()))
            .await;
        if let Err(err) = appended {
            if let Err(cleanup) = self.kv.delete(&key).await {
                log::error!("Failed to remove metadata {} after list update error: {}", key, cleanup);
            }
            return Err(err);
        }
        Ok(())
    }

    /// Drops the file from its folder's list and deletes its metadata.
    pub async fn remove_file(&self, folder_id: &str, file_id: &str) -> Result<(), StorageError> {
        self.update_file_list(folder_id, |files| files.retain(|f| f.id != file_id))
            .await?;
        self.kv.delete(&file_key(file_id)).await
    }

    /// Read-modify-write of `files:<folderId>` guarded by compare-and-swap,
    /// retried while other writers keep winning.
    async fn update_file_list<F>(&self, folder_id: &str, mut apply: F) -> Result<(), StorageError>
    where
        F: FnMut(&mut Vec<FileRecord>) + Send,
    {
        let key = files_key(folder_id);

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self.kv.get(&key).await?;
            let (mut files, version) = match &current {
                Some(entry) => (decode::<Vec<FileRecord>>(&key, &entry.value)?, Some(entry.version)),
                None => (Vec::new(), None),
            };

            apply(&mut files);

            if self.kv.compare_and_swap(&key, version, encode(&key, &files)?).await? {
                return Ok(());
            }
            log::debug!("Lost update race on {} (attempt {})", key, attempt);
        }

        Err(StorageError::Contention(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    use crate::store::{MemoryKvStore, Versioned};

    fn folder(id: &str, age_minutes: i64) -> Folder {
        let at = Utc::now() - Duration::minutes(age_minutes);
        Folder {
            id: id.to_string(),
            name: format!("{} name", id),
            password_hash: "hash".to_string(),
            created_at: at,
            updated_at: at,
        }
    }

    fn stored(folder_id: &str, file_id: &str) -> StoredFile {
        StoredFile {
            record: FileRecord {
                id: file_id.to_string(),
                folder_id: folder_id.to_string(),
                name: "notes.txt".to_string(),
                size: 5,
                mime_type: "text/plain".to_string(),
                url: FileRecord::download_url(file_id),
                created_at: Utc::now(),
            },
            key: format!("{}/{}-notes.txt", folder_id, file_id),
        }
    }

    #[tokio::test]
    async fn test_list_folders_newest_first() {
        let repo = FolderRepository::new(Arc::new(MemoryKvStore::new()));
        repo.create_folder(&folder("old", 60)).await.unwrap();
        repo.create_folder(&folder("new", 1)).await.unwrap();
        repo.create_folder(&folder("mid", 30)).await.unwrap();

        let ids: Vec<_> = repo.list_folders().await.unwrap().into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_add_and_remove_file() {
        let repo = FolderRepository::new(Arc::new(MemoryKvStore::new()));
        repo.create_folder(&folder("f1", 0)).await.unwrap();

        repo.add_file(&stored("f1", "a")).await.unwrap();
        repo.add_file(&stored("f1", "b")).await.unwrap();

        let ids: Vec<_> = repo.list_files("f1").await.unwrap().into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(repo.get_file("a").await.unwrap().unwrap().key, "f1/a-notes.txt");

        repo.remove_file("f1", "a").await.unwrap();
        let ids: Vec<_> = repo.list_files("f1").await.unwrap().into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec!["b"]);
        assert!(repo.get_file("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stored_file_json_keeps_key_private_field() {
        let kv = Arc::new(MemoryKvStore::new());
        let repo = FolderRepository::new(kv.clone());
        repo.add_file(&stored("f1", "a")).await.unwrap();

        let raw = kv.get("file:a").await.unwrap().unwrap().value;
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["folderId"], "f1");
        assert_eq!(json["key"], "f1/a-notes.txt");

        let list = kv.get("files:f1").await.unwrap().unwrap().value;
        assert!(!list.contains("\"key\""));
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let repo = FolderRepository::new(Arc::new(MemoryKvStore::new()));

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.add_file(&stored("f1", &format!("file{}", i))).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(repo.list_files("f1").await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_malformed_record_is_a_serialization_error() {
        let kv = Arc::new(MemoryKvStore::new());
        kv.put("folder:bad", "{not json".into()).await.unwrap();
        let repo = FolderRepository::new(kv);

        let err = repo.get_folder("bad").await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization { .. }));
    }

    /// Always loses the compare-and-swap.
    struct AlwaysRacing {
        inner: MemoryKvStore,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl KvStore for AlwaysRacing {
        async fn get(&self, key: &str) -> Result<Option<Versioned>, StorageError> {
            self.inner.get(key).await
        }
        async fn put(&self, key: &str, value: String) -> Result<(), StorageError> {
            self.inner.put(key, value).await
        }
        async fn compare_and_swap(&self, _: &str, _: Option<u64>, _: String) -> Result<bool, StorageError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }
        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.inner.delete(key).await
        }
        async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
            self.inner.list_keys(prefix).await
        }
    }

    #[tokio::test]
    async fn test_gives_up_after_bounded_attempts() {
        let kv = Arc::new(AlwaysRacing {
            inner: MemoryKvStore::new(),
            attempts: AtomicUsize::new(0),
        });
        let repo = FolderRepository::new(kv.clone());

        let err = repo.add_file(&stored("f1", "a")).await.unwrap_err();
        assert!(matches!(err, StorageError::Contention(ref key) if key == "files:f1"));
        assert_eq!(kv.attempts.load(Ordering::SeqCst), MAX_CAS_ATTEMPTS);
        assert!(repo.get_file("a").await.unwrap().is_none());
    }

    /// Fails every write of a `file:` key.
    struct RejectsFileRecords {
        inner: MemoryKvStore,
    }

    #[async_trait]
    impl KvStore for RejectsFileRecords {
        async fn get(&self, key: &str) -> Result<Option<Versioned>, StorageError> {
            self.inner.get(key).await
        }
        async fn put(&self, key: &str, value: String) -> Result<(), StorageError> {
            if key.starts_with("file:") {
                return Err(StorageError::Backend(format!("put {}: disk full", key)));
            }
            self.inner.put(key, value).await
        }
        async fn compare_and_swap(&self, key: &str, expected: Option<u64>, value: String) -> Result<bool, StorageError> {
            self.inner.compare_and_swap(key, expected, value).await
        }
        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.inner.delete(key).await
        }
        async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
            self.inner.list_keys(prefix).await
        }
    }

    #[tokio::test]
    async fn test_failed_metadata_write_leaves_no_list_entry() {
        let repo = FolderRepository::new(Arc::new(RejectsFileRecords {
            inner: MemoryKvStore::new(),
        }));
        repo.create_folder(&folder("f1", 0)).await.unwrap();

        let err = repo.add_file(&stored("f1", "a")).await.unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));
        assert!(repo.list_files("f1").await.unwrap().is_empty());
        assert!(repo.get_file("a").await.unwrap().is_none());
    }
}
