// Connector: a tenant's binding to an external data source (mail, drive, chat, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source application a connector talks to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum SourceApp {
    Mail,
    Drive,
    Chat,
    Sharepoint,
    Slack,
    GenericMcp,
}

/// How a connector authenticates against its source application.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    OAuth,
    ServiceAccount,
    ApiKey,
    Custom,
}

/// Connector lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ConnectorStatus {
    NotConnected,
    Connecting,
    Connected,
    Failed,
    Paused,
}

/// Opaque, encrypted-at-rest credential material for a connector.
///
/// Exactly one variant is populated consistent with `AuthMode` — enforced by
/// construction helpers rather than by the type itself, since the encrypted
/// blob shape is opaque to callers of this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credentials {
    OAuth {
        /// Encrypted refresh/access token bundle, opaque to this crate.
        encrypted_blob: String,
    },
    ServiceAccount {
        encrypted_blob: String,
        /// Delegated subject identity (e.g. the mailbox being impersonated).
        subject_email: String,
    },
    ApiKey {
        encrypted_blob: String,
    },
    Custom {
        encrypted_blob: String,
    },
}

impl Credentials {
    pub fn auth_mode(&self) -> AuthMode {
        match self {
            Credentials::OAuth { .. } => AuthMode::OAuth,
            Credentials::ServiceAccount { .. } => AuthMode::ServiceAccount,
            Credentials::ApiKey { .. } => AuthMode::ApiKey,
            Credentials::Custom { .. } => AuthMode::Custom,
        }
    }
}

/// A tenant's binding to an external data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Connector {
    pub id: Uuid,
    /// Stable, opaque, globally unique external identifier (safe to expose to clients).
    pub external_id: String,
    pub tenant_id: Uuid,
    pub owner_user_id: Uuid,
    pub app: SourceApp,
    pub auth_mode: AuthMode,
    pub status: ConnectorStatus,
    /// Set only for delegated service-account connectors.
    pub subject_identity: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Connector {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Request payload to create a connector.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateConnectorRequest {
    pub tenant_id: Uuid,
    pub owner_user_id: Uuid,
    pub app: SourceApp,
    pub auth_mode: AuthMode,
    pub credentials: Option<Credentials>,
}
