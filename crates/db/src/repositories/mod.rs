use async_trait::async_trait;
use thiserror::Error;

pub mod kv;
pub mod memory;

pub use kv::SqlKeyValueStore;
pub use memory::InMemoryKeyValueStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Byte-valued store with an atomic compare-and-set primitive.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RepositoryError>;

    /// Writes `new` only if the current value equals `expected` (`None` meaning absent).
    /// Returns `false` when the comparison fails.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, RepositoryError>;
}
