use sqlx::Row;

use super::{KeyValueStore, RepositoryError};
use crate::DbPool;

pub struct SqlKeyValueStore {
    pool: DbPool,
}

impl SqlKeyValueStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl KeyValueStore for SqlKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RepositoryError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => {
                let value: Vec<u8> =
                    r.try_get("value").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, RepositoryError> {
        let result = match expected {
            None => {
                sqlx::query(
                    "INSERT INTO kv_store (key, value) VALUES (?, ?)
                     ON CONFLICT(key) DO NOTHING",
                )
                .bind(key)
                .bind(new)
                .execute(&self.pool)
                .await?
            }
            Some(previous) => {
                sqlx::query(
                    "UPDATE kv_store
                     SET value = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE key = ? AND value = ?",
                )
                .bind(new)
                .bind(key)
                .bind(previous)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected() == 1)
    }
}
