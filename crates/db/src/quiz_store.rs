use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use cquiz_core::errors::ApplicationError;
use cquiz_core::QuizDocument;

use crate::repositories::{KeyValueStore, RepositoryError};

pub const DEFAULT_DOCUMENT_KEY: &str = "quizzes";

/// Exact serialized bytes a snapshot was decoded from. `None` when the key was absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VersionToken(Option<Vec<u8>>);

impl VersionToken {
    pub fn absent() -> Self {
        Self(None)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.0.as_deref()
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub quizzes: QuizDocument,
    pub version: VersionToken,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("quiz document changed since it was read")]
    Conflict,
    #[error("could not encode quiz document: {0}")]
    Serialization(String),
    #[error(transparent)]
    Backend(#[from] RepositoryError),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict => Self::Conflict,
            StoreError::Serialization(message) => Self::Serialization(message),
            StoreError::Backend(error) => Self::Persistence(error.to_string()),
        }
    }
}

/// All quizzes persisted as one JSON document under a single key.
#[derive(Clone)]
pub struct QuizStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
}

impl QuizStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self { kv, key: key.into() }
    }

    /// Reads the document. A corrupt value yields an empty document whose token is the
    /// corrupt bytes: an absent token would never match the stored value, so no later save
    /// could replace it.
    pub async fn load_all(&self) -> Result<Snapshot, StoreError> {
        let Some(raw) = self.kv.get(&self.key).await? else {
            return Ok(Snapshot { quizzes: QuizDocument::new(), version: VersionToken::absent() });
        };

        let quizzes = match serde_json::from_slice::<QuizDocument>(&raw) {
            Ok(quizzes) => quizzes,
            Err(error) => {
                warn!(
                    event_name = "store.document_corrupt",
                    key = %self.key,
                    bytes = raw.len(),
                    error = %error,
                    "quiz document could not be decoded; treating it as empty"
                );
                QuizDocument::new()
            }
        };

        Ok(Snapshot { quizzes, version: VersionToken(Some(raw)) })
    }

    /// Compare-and-swap against `version`; returns the token of the newly stored bytes.
    pub async fn save_all(
        &self,
        quizzes: &QuizDocument,
        version: &VersionToken,
    ) -> Result<VersionToken, StoreError> {
        let encoded = serde_json::to_vec(quizzes)
            .map_err(|error| StoreError::Serialization(error.to_string()))?;

        let written = self.kv.compare_and_set(&self.key, version.as_bytes(), &encoded).await?;
        if !written {
            return Err(StoreError::Conflict);
        }

        Ok(VersionToken(Some(encoded)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cquiz_core::errors::{ApplicationError, DomainError};
    use cquiz_core::QuizDocument;

    use super::{QuizStore, StoreError, VersionToken, DEFAULT_DOCUMENT_KEY};
    use crate::repositories::{InMemoryKeyValueStore, KeyValueStore};

    fn store_with(kv: Arc<InMemoryKeyValueStore>) -> QuizStore {
        QuizStore::new(kv, DEFAULT_DOCUMENT_KEY)
    }

    #[tokio::test]
    async fn missing_document_loads_empty_with_absent_token() {
        let store = store_with(Arc::new(InMemoryKeyValueStore::new()));

        let snapshot = store.load_all().await.expect("load");

        assert!(snapshot.quizzes.is_empty());
        assert!(snapshot.version.is_absent());
    }

    #[tokio::test]
    async fn save_then_load_round_trips_document() {
        let store = store_with(Arc::new(InMemoryKeyValueStore::new()));
        let mut snapshot = store.load_all().await.expect("load");
        snapshot.quizzes.create_quiz("Sprint", "U1").expect("create");
        let token = store.save_all(&snapshot.quizzes, &snapshot.version).await.expect("save");

        let reloaded = store.load_all().await.expect("reload");
        assert_eq!(reloaded.quizzes, snapshot.quizzes);
        assert_eq!(reloaded.version, token);

        let again = store.save_all(&reloaded.quizzes, &reloaded.version).await.expect("resave");
        assert_eq!(again, token, "unchanged document serializes to identical bytes");
        assert_eq!(store.load_all().await.expect("final load").quizzes, reloaded.quizzes);
    }

    #[tokio::test]
    async fn stale_writer_gets_conflict_and_store_keeps_winner() {
        let store = store_with(Arc::new(InMemoryKeyValueStore::new()));
        let mut writer_a = store.load_all().await.expect("load a");
        let mut writer_b = store.load_all().await.expect("load b");

        writer_b.quizzes.create_quiz("Beta", "U2").expect("create beta");
        store.save_all(&writer_b.quizzes, &writer_b.version).await.expect("b saves");

        writer_a.quizzes.create_quiz("Alpha", "U1").expect("create alpha");
        let error = store
            .save_all(&writer_a.quizzes, &writer_a.version)
            .await
            .expect_err("a holds a stale token");

        assert!(error.is_conflict());
        assert!(ApplicationError::from(error).is_conflict());
        let stored = store.load_all().await.expect("load");
        assert!(stored.quizzes.contains("Beta"));
        assert!(!stored.quizzes.contains("Alpha"));
    }

    #[tokio::test]
    async fn duplicate_create_leaves_store_unchanged() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let store = store_with(kv.clone());
        let mut snapshot = store.load_all().await.expect("load");
        snapshot.quizzes.create_quiz("Sprint", "U1").expect("create");
        store.save_all(&snapshot.quizzes, &snapshot.version).await.expect("save");
        let before = kv.get(DEFAULT_DOCUMENT_KEY).await.expect("raw");

        let mut snapshot = store.load_all().await.expect("reload");
        let error = snapshot.quizzes.create_quiz("Sprint", "U9").expect_err("duplicate");

        assert!(matches!(error, DomainError::AlreadyExists { .. }));
        assert_eq!(kv.get(DEFAULT_DOCUMENT_KEY).await.expect("raw"), before);
    }

    #[tokio::test]
    async fn corrupt_document_loads_empty_and_is_overwritten_on_save() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        kv.put(DEFAULT_DOCUMENT_KEY, b"{not json".to_vec()).await;
        let store = store_with(kv.clone());

        let mut snapshot = store.load_all().await.expect("corrupt document is not fatal");
        assert!(snapshot.quizzes.is_empty());
        assert_eq!(snapshot.version.as_bytes(), Some(b"{not json".as_slice()));

        snapshot.quizzes.create_quiz("Sprint", "U1").expect("create");
        store.save_all(&snapshot.quizzes, &snapshot.version).await.expect("save replaces");
        assert!(store.load_all().await.expect("load").quizzes.contains("Sprint"));
    }

    #[tokio::test]
    async fn corrupt_document_rejects_an_absent_token() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        kv.put(DEFAULT_DOCUMENT_KEY, b"{not json".to_vec()).await;
        let store = store_with(kv.clone());

        let error = store
            .save_all(&QuizDocument::new(), &VersionToken::absent())
            .await
            .expect_err("stored bytes are present");

        assert!(error.is_conflict());
        assert_eq!(
            kv.get(DEFAULT_DOCUMENT_KEY).await.expect("raw"),
            Some(b"{not json".to_vec())
        );
    }

    #[tokio::test]
    async fn absent_token_conflicts_once_document_exists() {
        let store = store_with(Arc::new(InMemoryKeyValueStore::new()));
        let mut snapshot = store.load_all().await.expect("load");
        snapshot.quizzes.create_quiz("Sprint", "U1").expect("create");
        store.save_all(&snapshot.quizzes, &snapshot.version).await.expect("save");

        let error = store
            .save_all(&snapshot.quizzes, &VersionToken::absent())
            .await
            .expect_err("document already exists");

        assert!(matches!(error, StoreError::Conflict));
    }
}
