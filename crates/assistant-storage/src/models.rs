// Database row shapes (internal — may differ from the public DTOs in
// `assistant_contracts`). Conversions to/from the contract types live here
// too, since only this crate knows the TEXT encoding used for enum columns.

use assistant_contracts::{
    AuthMode, Connector, ConnectorStatus, IngestionJob, IngestionJobMetadata, IngestionJobStatus,
    OAuthProvider, SourceApp, Tool,
};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

pub(crate) fn app_to_text(app: SourceApp) -> &'static str {
    match app {
        SourceApp::Mail => "mail",
        SourceApp::Drive => "drive",
        SourceApp::Chat => "chat",
        SourceApp::Sharepoint => "sharepoint",
        SourceApp::Slack => "slack",
        SourceApp::GenericMcp => "generic_mcp",
    }
}

pub(crate) fn app_from_text(text: &str) -> anyhow::Result<SourceApp> {
    Ok(match text {
        "mail" => SourceApp::Mail,
        "drive" => SourceApp::Drive,
        "chat" => SourceApp::Chat,
        "sharepoint" => SourceApp::Sharepoint,
        "slack" => SourceApp::Slack,
        "generic_mcp" => SourceApp::GenericMcp,
        other => anyhow::bail!("unknown source app '{other}'"),
    })
}

pub(crate) fn auth_mode_to_text(mode: AuthMode) -> &'static str {
    match mode {
        AuthMode::OAuth => "oauth",
        AuthMode::ServiceAccount => "service_account",
        AuthMode::ApiKey => "api_key",
        AuthMode::Custom => "custom",
    }
}

pub(crate) fn auth_mode_from_text(text: &str) -> anyhow::Result<AuthMode> {
    Ok(match text {
        "oauth" => AuthMode::OAuth,
        "service_account" => AuthMode::ServiceAccount,
        "api_key" => AuthMode::ApiKey,
        "custom" => AuthMode::Custom,
        other => anyhow::bail!("unknown auth mode '{other}'"),
    })
}

pub(crate) fn connector_status_to_text(status: ConnectorStatus) -> &'static str {
    match status {
        ConnectorStatus::NotConnected => "not_connected",
        ConnectorStatus::Connecting => "connecting",
        ConnectorStatus::Connected => "connected",
        ConnectorStatus::Failed => "failed",
        ConnectorStatus::Paused => "paused",
    }
}

pub(crate) fn connector_status_from_text(text: &str) -> anyhow::Result<ConnectorStatus> {
    Ok(match text {
        "not_connected" => ConnectorStatus::NotConnected,
        "connecting" => ConnectorStatus::Connecting,
        "connected" => ConnectorStatus::Connected,
        "failed" => ConnectorStatus::Failed,
        "paused" => ConnectorStatus::Paused,
        other => anyhow::bail!("unknown connector status '{other}'"),
    })
}

pub(crate) fn job_status_to_text(status: IngestionJobStatus) -> &'static str {
    match status {
        IngestionJobStatus::Pending => "pending",
        IngestionJobStatus::Running => "running",
        IngestionJobStatus::Succeeded => "succeeded",
        IngestionJobStatus::Failed => "failed",
        IngestionJobStatus::Cancelled => "cancelled",
    }
}

pub(crate) fn job_status_from_text(text: &str) -> anyhow::Result<IngestionJobStatus> {
    Ok(match text {
        "pending" => IngestionJobStatus::Pending,
        "running" => IngestionJobStatus::Running,
        "succeeded" => IngestionJobStatus::Succeeded,
        "failed" => IngestionJobStatus::Failed,
        "cancelled" => IngestionJobStatus::Cancelled,
        other => anyhow::bail!("unknown ingestion job status '{other}'"),
    })
}

/// Connector row. `credentials_encrypted` is the opaque envelope-encrypted
/// blob; its shape depends on `auth_mode` and is only meaningful once
/// decrypted by `EncryptionService`.
#[derive(Debug, Clone, FromRow)]
pub struct ConnectorRow {
    pub id: Uuid,
    pub external_id: String,
    pub tenant_id: Uuid,
    pub owner_user_id: Uuid,
    pub app: String,
    pub auth_mode: String,
    pub status: String,
    pub credentials_encrypted: Option<Vec<u8>>,
    pub subject_identity: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ConnectorRow {
    /// Converts to the public `Connector` DTO. Does not decrypt
    /// `credentials_encrypted` — callers that need the plaintext go through
    /// `EncryptionService` explicitly, since decryption is rarely needed
    /// just to render a connector in a list.
    pub fn into_connector(self) -> anyhow::Result<Connector> {
        Ok(Connector {
            id: self.id,
            external_id: self.external_id,
            tenant_id: self.tenant_id,
            owner_user_id: self.owner_user_id,
            app: app_from_text(&self.app)?,
            auth_mode: auth_mode_from_text(&self.auth_mode)?,
            status: connector_status_from_text(&self.status)?,
            subject_identity: self.subject_identity,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewConnector {
    pub external_id: String,
    pub tenant_id: Uuid,
    pub owner_user_id: Uuid,
    pub app: SourceApp,
    pub auth_mode: AuthMode,
    /// Already-encrypted credential bytes, or `None` for connectors
    /// configured later (e.g. via the OAuth callback).
    pub credentials_encrypted: Option<Vec<u8>>,
    pub subject_identity: Option<String>,
}

/// OAuth provider row. `client_secret_encrypted` mirrors
/// `Credentials::encrypted_blob` in spirit — opaque outside this crate.
#[derive(Debug, Clone, FromRow)]
pub struct OAuthProviderRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub app: String,
    pub client_id: String,
    pub client_secret_encrypted: Vec<u8>,
    pub scopes: Vec<String>,
    pub is_global: bool,
}

impl OAuthProviderRow {
    /// Converts to the public DTO. `encrypted_client_secret` carries the
    /// base64 form of the encrypted bytes — the DTO type is `String` and
    /// marked `#[serde(skip_serializing)]`, so it never reaches API
    /// responses; it exists so callers with the `EncryptionService` can
    /// still decrypt it without a second round-trip to storage.
    pub fn into_oauth_provider(self) -> anyhow::Result<OAuthProvider> {
        use base64::{engine::general_purpose::STANDARD, Engine};
        Ok(OAuthProvider {
            id: self.id,
            workspace_id: self.workspace_id,
            app: app_from_text(&self.app)?,
            client_id: self.client_id,
            encrypted_client_secret: STANDARD.encode(&self.client_secret_encrypted),
            scopes: self.scopes,
            is_global: self.is_global,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewOAuthProvider {
    pub workspace_id: Uuid,
    pub app: SourceApp,
    pub client_id: String,
    pub client_secret_encrypted: Vec<u8>,
    pub scopes: Vec<String>,
    pub is_global: bool,
}

/// Ingestion job row. `metadata` is stored as JSONB and deserializes
/// directly into the public `IngestionJobMetadata` shape — there is no
/// internal/external split for this one, unlike connectors.
#[derive(Debug, Clone, FromRow)]
pub struct IngestionJobRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub connector_id: Uuid,
    pub status: String,
    #[sqlx(json)]
    pub metadata: IngestionJobMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IngestionJobRow {
    pub fn into_ingestion_job(self) -> anyhow::Result<IngestionJob> {
        Ok(IngestionJob {
            id: self.id,
            user_id: self.user_id,
            connector_id: self.connector_id,
            status: job_status_from_text(&self.status)?,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Tool row. `schema` is JSONB and maps straight onto the contract type.
#[derive(Debug, Clone, FromRow)]
pub struct ToolRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub connector_id: Uuid,
    pub name: String,
    #[sqlx(json)]
    pub schema: serde_json::Value,
    pub description: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ToolRow {
    pub fn into_tool(self) -> Tool {
        Tool {
            id: self.id,
            workspace_id: self.workspace_id,
            connector_id: self.connector_id,
            name: self.name,
            schema: self.schema,
            description: self.description,
            enabled: self.enabled,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_app_text_round_trips_every_variant() {
        for app in [
            SourceApp::Mail,
            SourceApp::Drive,
            SourceApp::Chat,
            SourceApp::Sharepoint,
            SourceApp::Slack,
            SourceApp::GenericMcp,
        ] {
            assert_eq!(app_from_text(app_to_text(app)).unwrap(), app);
        }
    }

    #[test]
    fn auth_mode_text_round_trips_every_variant() {
        for mode in [AuthMode::OAuth, AuthMode::ServiceAccount, AuthMode::ApiKey, AuthMode::Custom] {
            assert_eq!(auth_mode_from_text(auth_mode_to_text(mode)).unwrap(), mode);
        }
    }

    #[test]
    fn connector_status_text_round_trips_every_variant() {
        for status in [
            ConnectorStatus::NotConnected,
            ConnectorStatus::Connecting,
            ConnectorStatus::Connected,
            ConnectorStatus::Failed,
            ConnectorStatus::Paused,
        ] {
            assert_eq!(connector_status_from_text(connector_status_to_text(status)).unwrap(), status);
        }
    }

    #[test]
    fn job_status_text_round_trips_every_variant() {
        for status in [
            IngestionJobStatus::Pending,
            IngestionJobStatus::Running,
            IngestionJobStatus::Succeeded,
            IngestionJobStatus::Failed,
            IngestionJobStatus::Cancelled,
        ] {
            assert_eq!(job_status_from_text(job_status_to_text(status)).unwrap(), status);
        }
    }

    #[test]
    fn unknown_text_is_rejected_rather_than_silently_defaulted() {
        assert!(app_from_text("unknown").is_err());
        assert!(auth_mode_from_text("unknown").is_err());
        assert!(connector_status_from_text("unknown").is_err());
        assert!(job_status_from_text("unknown").is_err());
    }
}
