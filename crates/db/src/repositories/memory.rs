use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{KeyValueStore, RepositoryError};

#[derive(Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditional write, for seeding tests with arbitrary bytes.
    pub async fn put(&self, key: &str, value: impl Into<Vec<u8>>) {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_owned(), value.into());
    }
}

#[async_trait::async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RepositoryError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, RepositoryError> {
        let mut entries = self.entries.write().await;
        if entries.get(key).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        entries.insert(key.to_owned(), new.to_vec());
        Ok(true)
    }
}
