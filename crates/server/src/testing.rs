use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use cquiz_chat::commands::CommandResponse;
use cquiz_chat::events::ChatEnvelope;
use cquiz_chat::socket::{ChatTransport, TransportError};
use cquiz_db::{InMemoryKeyValueStore, KeyValueStore, QuizStore, RepositoryError};

/// In-memory store whose writes can be scripted to lose the compare-and-set race.
#[derive(Default)]
pub(crate) struct ContendedStore {
    inner: InMemoryKeyValueStore,
    script: Mutex<VecDeque<bool>>,
}

impl ContendedStore {
    /// Queues outcomes for the next writes: `true` rejects the write as if another writer got
    /// there first, `false` lets it through. Writes past the script go through.
    pub(crate) async fn reject_writes(&self, pattern: &[bool]) {
        self.script.lock().await.extend(pattern.iter().copied());
    }

    pub(crate) async fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.get(key).await.expect("in-memory get")
    }
}

#[async_trait]
impl KeyValueStore for ContendedStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RepositoryError> {
        self.inner.get(key).await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, RepositoryError> {
        if self.script.lock().await.pop_front().unwrap_or(false) {
            return Ok(false);
        }
        self.inner.compare_and_set(key, expected, new).await
    }
}

/// Backend that fails every call.
pub(crate) struct UnreachableStore;

#[async_trait]
impl KeyValueStore for UnreachableStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, RepositoryError> {
        Err(RepositoryError::Decode("backend offline".to_owned()))
    }

    async fn compare_and_set(
        &self,
        _key: &str,
        _expected: Option<&[u8]>,
        _new: &[u8],
    ) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Decode("backend offline".to_owned()))
    }
}

pub(crate) fn contended_store() -> (Arc<ContendedStore>, QuizStore) {
    let kv = Arc::new(ContendedStore::default());
    let store = QuizStore::new(kv.clone(), cquiz_db::DEFAULT_DOCUMENT_KEY);
    (kv, store)
}

/// Transport whose stream is closed as soon as it connects.
pub(crate) struct IdleTransport;

#[async_trait]
impl ChatTransport for IdleTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(
        &self,
        _envelope_id: &str,
        _response: Option<&CommandResponse>,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
