pub type Result<T> = std::result::Result<T, ToolsError>;

#[derive(Debug, thiserror::Error)]
pub enum ToolsError {
    #[error("MCP transport error: {0}")]
    Transport(#[from] anyhow::Error),

    #[error("MCP server returned an error response: {0}")]
    RemoteError(String),

    #[error(transparent)]
    Storage(#[from] assistant_storage::StorageError),
}
