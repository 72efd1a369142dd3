pub mod connection;
pub mod migrations;
pub mod quiz_store;
pub mod repositories;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use quiz_store::{QuizStore, Snapshot, StoreError, VersionToken, DEFAULT_DOCUMENT_KEY};
pub use repositories::{InMemoryKeyValueStore, KeyValueStore, RepositoryError, SqlKeyValueStore};
