// Connector CRUD plus MCP tool discovery and status toggling (spec.md
// §4.6/§4.8). On creating a `generic_mcp` connector, synchronously opens
// the configured transport and synchronizes its tool catalog, exactly the
// four-step sequence the module doc comment in `assistant-tools::registry`
// describes: persist NotConnected, open transport, listTools + sync, close
// and flip status.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use assistant_contracts::{Connector, CreateConnectorRequest, SourceApp, Tool, ToolStatusUpdate};
use assistant_storage::{Database, EncryptionService, NewConnector};
use assistant_tools::{SseTransport, StdioTransport, StreamableHttpTransport};

use crate::common::ListResponse;
use crate::error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub encryption: Arc<EncryptionService>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum McpTransportConfig {
    StreamableHttp {
        endpoint: String,
        #[serde(default)]
        headers: Vec<(String, String)>,
    },
    Sse {
        sse_url: String,
        message_url: String,
        #[serde(default)]
        headers: Vec<(String, String)>,
    },
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateConnectorBody {
    #[serde(flatten)]
    pub request: CreateConnectorRequest,
    pub external_id: String,
    /// Required when `app` is `generic_mcp`; ignored otherwise.
    pub mcp: Option<McpTransportConfig>,
}

/// `POST /connectors`.
#[utoipa::path(
    post,
    path = "/connectors",
    request_body = CreateConnectorBody,
    responses((status = 201, body = Connector)),
    tag = "connectors"
)]
pub async fn create_connector(
    State(state): State<AppState>,
    Json(body): Json<CreateConnectorBody>,
) -> ApiResult<(axum::http::StatusCode, Json<Connector>)> {
    let subject_identity = match &body.request.credentials {
        Some(assistant_contracts::Credentials::ServiceAccount { subject_email, .. }) => Some(subject_email.clone()),
        _ => None,
    };
    let credentials_encrypted = body
        .request
        .credentials
        .as_ref()
        .map(|creds| {
            let plaintext = serde_json::to_vec(creds).map_err(|e| ApiError::Internal(e.into()))?;
            state.encryption.encrypt(&plaintext).map_err(ApiError::Internal)
        })
        .transpose()?;

    let connector = state
        .db
        .create_connector(NewConnector {
            external_id: body.external_id,
            tenant_id: body.request.tenant_id,
            owner_user_id: body.request.owner_user_id,
            app: body.request.app,
            auth_mode: body.request.auth_mode,
            credentials_encrypted,
            subject_identity,
        })
        .await?;

    let connector = if body.request.app == SourceApp::GenericMcp {
        match body.mcp {
            Some(config) => sync_mcp_tools(&state.db, connector, config).await?,
            None => connector,
        }
    } else {
        connector
    };

    Ok((axum::http::StatusCode::CREATED, Json(connector)))
}

async fn sync_mcp_tools(db: &Database, connector: Connector, config: McpTransportConfig) -> ApiResult<Connector> {
    let workspace_id = connector.tenant_id;

    let mut transport: Box<dyn assistant_tools::McpTransport> = match config {
        McpTransportConfig::StreamableHttp { endpoint, headers } => {
            Box::new(StreamableHttpTransport::new(endpoint, headers).map_err(ApiError::Internal)?)
        }
        McpTransportConfig::Sse { sse_url, message_url, headers } => Box::new(
            SseTransport::connect(&sse_url, message_url, headers).await.map_err(ApiError::Internal)?,
        ),
        McpTransportConfig::Stdio { command, args } => {
            Box::new(StdioTransport::spawn(&command, &args).map_err(ApiError::Internal)?)
        }
    };

    assistant_tools::registry::sync_connector(db, workspace_id, &connector, transport.as_mut())
        .await
        .map_err(ApiError::Tools)?;

    db.get_connector(connector.id).await?.ok_or(ApiError::Storage(assistant_storage::StorageError::ConnectorNotFound))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListConnectorsQuery {
    pub tenant_id: Uuid,
    pub owner_user_id: Uuid,
}

/// `GET /connectors`.
#[utoipa::path(
    get,
    path = "/connectors",
    params(("tenant_id" = Uuid, Query), ("owner_user_id" = Uuid, Query)),
    responses((status = 200, body = ListResponse<Connector>)),
    tag = "connectors"
)]
pub async fn list_connectors(
    State(state): State<AppState>,
    axum::extract::Query(query): axum::extract::Query<ListConnectorsQuery>,
) -> ApiResult<Json<ListResponse<Connector>>> {
    let connectors = state.db.list_connectors(query.tenant_id, query.owner_user_id).await?;
    Ok(Json(connectors.into()))
}

/// `GET /connectors/:id`.
#[utoipa::path(get, path = "/connectors/{id}", responses((status = 200, body = Connector), (status = 404)), tag = "connectors")]
pub async fn get_connector(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Connector>> {
    let connector = state.db.get_connector(id).await?.ok_or(ApiError::Storage(assistant_storage::StorageError::ConnectorNotFound))?;
    Ok(Json(connector))
}

/// `DELETE /connectors/:id` — soft-delete, cascading to tools and active jobs.
#[utoipa::path(delete, path = "/connectors/{id}", responses((status = 204), (status = 404)), tag = "connectors")]
pub async fn delete_connector(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<axum::http::StatusCode> {
    let deleted = state.db.delete_connector(id).await?;
    if deleted {
        Ok(axum::http::StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::Storage(assistant_storage::StorageError::ConnectorNotFound))
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateToolsStatusBody {
    pub tools: Vec<ToolStatusUpdate>,
}

/// `POST /admin/connector/:id/tools` — partial-success shape: one failure
/// doesn't abort the rest of the batch.
#[utoipa::path(
    post,
    path = "/admin/connector/{id}/tools",
    request_body = UpdateToolsStatusBody,
    responses((status = 200, body = assistant_contracts::PartialToolUpdateResult)),
    tag = "connectors"
)]
pub async fn update_tools_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateToolsStatusBody>,
) -> ApiResult<Json<assistant_contracts::PartialToolUpdateResult>> {
    let connector = state.db.get_connector(id).await?.ok_or(ApiError::Storage(assistant_storage::StorageError::ConnectorNotFound))?;
    let result = state.db.update_tools_status(connector.tenant_id, body.tools).await?;
    Ok(Json(result))
}

/// `GET /connectors/:id/tools` — the connector's enabled tool catalog.
#[utoipa::path(get, path = "/connectors/{id}/tools", responses((status = 200, body = ListResponse<Tool>)), tag = "connectors")]
pub async fn list_connector_tools(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<ListResponse<Tool>>> {
    let tools = state.db.list_enabled_tools_for_connector(id).await?;
    Ok(Json(tools.into()))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/connectors", post(create_connector).get(list_connectors))
        .route("/connectors/:id", get(get_connector).delete(delete_connector))
        .route("/connectors/:id/tools", get(list_connector_tools))
        .route("/admin/connector/:id/tools", post(update_tools_status))
        .with_state(state)
}
