// Postgres persistence for connectors, OAuth providers, ingestion jobs,
// and MCP tools (spec.md §4.6-§4.9), plus envelope encryption for
// credential blobs at rest.

pub mod deletion;
pub mod encryption;
pub mod error;
pub mod models;
pub mod repositories;

pub use deletion::{
    DataDeletionResult, DeletionCoordinator, DeletionOptions, SearchIndexDeleter,
    ServiceDeletionOutcome,
};
pub use encryption::{
    generate_encryption_key, EncryptedColumn, EncryptedPayload, EncryptionService,
    ENCRYPTED_COLUMNS,
};
pub use error::{Result, StorageError};
pub use models::{
    ConnectorRow, IngestionJobRow, NewConnector, NewOAuthProvider, OAuthProviderRow, ToolRow,
};
pub use repositories::Database;
