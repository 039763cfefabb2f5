// OAuthProvider: per-connector (or per-workspace, when global) client credentials.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OAuthProvider {
    pub id: Uuid,
    /// Workspace the provider is scoped to. Ignored for lookups when `is_global`.
    pub workspace_id: Uuid,
    pub app: super::connector::SourceApp,
    pub client_id: String,
    /// Encrypted at rest; never serialized back out to API responses.
    #[serde(skip_serializing)]
    pub encrypted_client_secret: String,
    pub scopes: Vec<String>,
    /// When true, any tenant connector for this app may reference this provider.
    pub is_global: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateOAuthProviderRequest {
    pub workspace_id: Uuid,
    pub app: super::connector::SourceApp,
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
    #[serde(default)]
    pub is_global: bool,
}
