// Storage-level error taxonomy (spec.md §7's persistence-facing kinds).
// `assistant-api` maps these onto HTTP status codes at the transport edge;
// this crate never knows about HTTP.

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("ingestion job already running for this connector")]
    IngestionAlreadyRunning,

    #[error("connector not found")]
    ConnectorNotFound,

    #[error("tool not found")]
    ToolNotFound,

    #[error("a global OAuth provider already exists for this app")]
    DuplicateGlobalProvider,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
