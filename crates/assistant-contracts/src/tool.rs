// Tool: an MCP tool advertised by a connector, identified by (workspaceId, connectorId, toolName).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Tool {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub connector_id: Uuid,
    pub name: String,
    /// JSON Schema for the tool's arguments, as advertised by the MCP server.
    pub schema: serde_json::Value,
    pub description: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A tool as discovered from `listTools`, prior to being persisted.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DiscoveredTool {
    pub name: String,
    pub description: String,
    pub schema: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ToolStatusUpdate {
    pub tool_id: Uuid,
    pub enabled: bool,
}

/// Outcome of an `UpdateToolsStatus` batch call: succeeded ids plus the
/// failures that occurred, since no single failure aborts the others.
#[derive(Debug, Clone, Default, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PartialToolUpdateResult {
    pub updated: Vec<Uuid>,
    pub failed: Vec<ToolUpdateFailure>,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ToolUpdateFailure {
    pub tool_id: Uuid,
    pub reason: String,
}
