use assistant_contracts::IngestionScopeError;
use assistant_storage::StorageError;

pub type Result<T> = std::result::Result<T, IngestionError>;

#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error(transparent)]
    InvalidScope(#[from] IngestionScopeError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
