// Error taxonomy for provider dispatch and the chat driver contract.
// Kinds mirror spec.md §7 — they are tags surfaced to callers, not internal
// exception hierarchies, so the enum stays flat.

use assistant_contracts::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no LLM provider configured")]
    NoProviderConfigured,

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("provider transport error: {0}")]
    ProviderTransport(String),

    #[error("provider rate limited: {0}")]
    ProviderRateLimited(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    /// Maps this error to the wire-level error kind used on a terminal
    /// streaming event (spec.md §7's propagation policy).
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NoProviderConfigured => ErrorKind::NoProviderConfigured,
            CoreError::InvalidModel(_) => ErrorKind::InvalidModel,
            CoreError::ProviderTransport(_) => ErrorKind::ProviderTransport,
            CoreError::ProviderRateLimited(_) => ErrorKind::ProviderRateLimited,
            CoreError::Internal(_) => ErrorKind::ProviderTransport,
        }
    }
}
