use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::{KvStore, StorageError, Versioned};

/// Key-value store backed by the `kv_entries` table.
#[derive(Clone)]
pub struct PgKvStore {
    pool: PgPool,
}

impl PgKvStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KvStore for PgKvStore {
    async fn get(&self, key: &str) -> Result<Option<Versioned>, StorageError> {
        let row = sqlx::query("SELECT value, version FROM kv_entries WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            let value: String = row.try_get("value")?;
            let version: i64 = row.try_get("version")?;
            Ok::<_, StorageError>(Versioned { value, version: version as u64 })
        })
        .transpose()
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO kv_entries (key, value, version) VALUES ($1, $2, 1)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, version = kv_entries.version + 1",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected_version: Option<u64>,
        value: String,
    ) -> Result<bool, StorageError> {
        let result = match expected_version {
            None => {
                sqlx::query(
                    "INSERT INTO kv_entries (key, value, version) VALUES ($1, $2, 1)
                     ON CONFLICT (key) DO NOTHING",
                )
                .bind(key)
                .bind(value)
                .execute(&self.pool)
                .await?
            }
            Some(version) => {
                sqlx::query(
                    "UPDATE kv_entries SET value = $2, version = version + 1
                     WHERE key = $1 AND version = $3",
                )
                .bind(key)
                .bind(value)
                .bind(version as i64)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM kv_entries WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        // starts_with() instead of LIKE so '_' and '%' in ids need no escaping
        let rows = sqlx::query("SELECT key FROM kv_entries WHERE starts_with(key, $1) ORDER BY key")
            .bind(prefix)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("key").map_err(StorageError::from))
            .collect()
    }
}
