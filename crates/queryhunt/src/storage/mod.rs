pub mod schema;
pub mod sqlite;

use async_trait::async_trait;

use crate::models::{NamespaceId, StatementBatch};

pub use sqlite::{QueryRows, SqliteGateway};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("namespace `{0}` already exists")]
    NamespaceExists(NamespaceId),

    #[error("namespace `{0}` does not exist")]
    NamespaceMissing(NamespaceId),

    #[error("query #{} failed: {message}: `{statement}`", .index + 1)]
    Execution {
        index: usize,
        statement: String,
        message: String,
    },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("batch cancelled before commit")]
    Cancelled,

    #[error("storage task failed: {0}")]
    Task(String),
}

/// Isolated per-namespace storage. Implementations serialize access within a namespace.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    async fn create_namespace(&self, namespace: &NamespaceId) -> Result<(), StorageError>;

    /// Runs the batch atomically: either every statement applies or none does.
    async fn execute_in_namespace(
        &self,
        namespace: &NamespaceId,
        batch: &StatementBatch,
    ) -> Result<(), StorageError>;

    /// Deletes every row and keeps the tables. Idempotent.
    async fn reset_tables(&self, namespace: &NamespaceId) -> Result<(), StorageError>;

    async fn drop_namespace(&self, namespace: &NamespaceId) -> Result<(), StorageError>;
}
