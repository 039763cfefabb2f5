// Admin plane: service-account registration, ingestion scope expansion,
// and the data-deletion coordinator (spec.md §4.6's `AddServiceConnection`,
// §4.7, §4.9). Every route here is gated by `AdminPrincipal`.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use assistant_contracts::{AuthMode, Credentials, IngestionScope, SourceApp};
use assistant_ingestion::IngestionOrchestrator;
use assistant_storage::{
    DataDeletionResult, DeletionCoordinator, DeletionOptions, Database, EncryptionService, NewConnector,
};

use crate::auth::{AdminPrincipal, AuthConfig};
use crate::error::{ApiError, ApiResult};
use crate::stubs::{NoopIngestionWorker, NoopSearchIndexDeleter};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub encryption: Arc<EncryptionService>,
    pub orchestrator: Arc<IngestionOrchestrator<NoopIngestionWorker>>,
    pub auth: AuthConfig,
}

impl axum::extract::FromRef<AppState> for AuthConfig {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

fn parse_optional_date(value: &str) -> ApiResult<Option<DateTime<Utc>>> {
    if value.is_empty() {
        return Ok(None);
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("invalid date '{value}', expected YYYY-MM-DD")))?;
    Ok(Some(date.and_hms_opt(0, 0, 0).unwrap().and_utc()))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceAccountResponse {
    pub connector_id: Uuid,
    pub ingestion_id: Uuid,
}

/// `POST /admin/service-account` (multipart) — registers a service-account
/// connector from an uploaded key file and schedules ingestion for it.
#[utoipa::path(post, path = "/admin/service-account", responses((status = 201, body = ServiceAccountResponse)), tag = "admin")]
pub async fn create_service_account(
    _admin: AdminPrincipal,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ServiceAccountResponse>> {
    let mut tenant_id: Option<Uuid> = None;
    let mut owner_user_id: Option<Uuid> = None;
    let mut subject_email: Option<String> = None;
    let mut key_blob: Option<Vec<u8>> = None;
    let mut app = SourceApp::Mail;

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::BadRequest(e.to_string()))? {
        match field.name().unwrap_or_default() {
            "tenant_id" => {
                tenant_id = Some(
                    field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?.parse()
                        .map_err(|_| ApiError::BadRequest("invalid tenant_id".into()))?,
                )
            }
            "owner_user_id" => {
                owner_user_id = Some(
                    field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?.parse()
                        .map_err(|_| ApiError::BadRequest("invalid owner_user_id".into()))?,
                )
            }
            "subject_email" => subject_email = Some(field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?),
            "app" => {
                app = match field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?.as_str() {
                    "mail" => SourceApp::Mail,
                    "drive" => SourceApp::Drive,
                    "chat" => SourceApp::Chat,
                    "sharepoint" => SourceApp::Sharepoint,
                    other => return Err(ApiError::BadRequest(format!("unsupported service-account app '{other}'"))),
                }
            }
            "key" => key_blob = Some(field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?.to_vec()),
            _ => {}
        }
    }

    let tenant_id = tenant_id.ok_or_else(|| ApiError::BadRequest("tenant_id is required".into()))?;
    let owner_user_id = owner_user_id.ok_or_else(|| ApiError::BadRequest("owner_user_id is required".into()))?;
    let subject_email = subject_email.ok_or_else(|| ApiError::BadRequest("subject_email is required".into()))?;
    let key_blob = key_blob.ok_or_else(|| ApiError::BadRequest("key file is required".into()))?;

    let credentials = Credentials::ServiceAccount {
        encrypted_blob: {
            use base64::{engine::general_purpose::STANDARD, Engine};
            STANDARD.encode(&key_blob)
        },
        subject_email: subject_email.clone(),
    };
    let credentials_encrypted = state
        .encryption
        .encrypt(&serde_json::to_vec(&credentials).map_err(|e| ApiError::Internal(e.into()))?)
        .map_err(ApiError::Internal)?;

    let connector = state
        .db
        .create_connector(NewConnector {
            external_id: format!("sa-{}", Uuid::new_v4()),
            tenant_id,
            owner_user_id,
            app,
            auth_mode: AuthMode::ServiceAccount,
            credentials_encrypted: Some(credentials_encrypted),
            subject_identity: Some(subject_email),
        })
        .await?;

    let job = state
        .orchestrator
        .start_ingestion(owner_user_id, connector.id, IngestionScope::default())
        .await
        .map_err(ApiError::Ingestion)?;

    Ok(Json(ServiceAccountResponse { connector_id: connector.id, ingestion_id: job.id }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct IngestMoreUsersRequest {
    pub connector_id: Uuid,
    pub emails_to_ingest: Vec<String>,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub insert_drive_and_contacts: bool,
    #[serde(default)]
    pub insert_gmail: bool,
    #[serde(default)]
    pub insert_calendar: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IngestionStartedResponse {
    pub ingestion_id: Uuid,
}

/// `POST /admin/ingest-more-users` — expands a service-account connector's
/// ingestion scope to additional mailboxes.
#[utoipa::path(post, path = "/admin/ingest-more-users", responses((status = 201, body = IngestionStartedResponse)), tag = "admin")]
pub async fn ingest_more_users(
    _admin: AdminPrincipal,
    State(state): State<AppState>,
    Json(request): Json<IngestMoreUsersRequest>,
) -> ApiResult<Json<IngestionStartedResponse>> {
    let connector = state
        .db
        .get_connector(request.connector_id)
        .await?
        .ok_or(ApiError::Storage(assistant_storage::StorageError::ConnectorNotFound))?;

    let mut services = Vec::new();
    if request.insert_drive_and_contacts {
        services.push("drive_and_contacts".to_string());
    }
    if request.insert_gmail {
        services.push("gmail".to_string());
    }
    if request.insert_calendar {
        services.push("calendar".to_string());
    }

    let scope = IngestionScope {
        start_date: parse_optional_date(&request.start_date)?,
        end_date: parse_optional_date(&request.end_date)?,
        services,
        channels: request.emails_to_ingest,
        include_bot_messages: false,
    };

    let job = state
        .orchestrator
        .start_ingestion(connector.owner_user_id, connector.id, scope)
        .await
        .map_err(ApiError::Ingestion)?;

    Ok(Json(IngestionStartedResponse { ingestion_id: job.id }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SlackIngestChannelsRequest {
    pub connector_id: Uuid,
    pub channels_to_ingest: Vec<String>,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub include_bot_message: bool,
}

/// `POST /admin/slack/ingest-channels` — schedules ingestion of a channel
/// set for a Slack connector; progress is broadcast over the connector's
/// websocket/SSE progress channel (`assistant_ingestion::ProgressReporter`).
#[utoipa::path(post, path = "/admin/slack/ingest-channels", responses((status = 201, body = IngestionStartedResponse)), tag = "admin")]
pub async fn slack_ingest_channels(
    _admin: AdminPrincipal,
    State(state): State<AppState>,
    Json(request): Json<SlackIngestChannelsRequest>,
) -> ApiResult<Json<IngestionStartedResponse>> {
    let connector = state
        .db
        .get_connector(request.connector_id)
        .await?
        .ok_or(ApiError::Storage(assistant_storage::StorageError::ConnectorNotFound))?;

    let scope = IngestionScope {
        start_date: parse_optional_date(&request.start_date)?,
        end_date: parse_optional_date(&request.end_date)?,
        services: Vec::new(),
        channels: request.channels_to_ingest,
        include_bot_messages: request.include_bot_message,
    };

    let job = state
        .orchestrator
        .start_ingestion(connector.owner_user_id, connector.id, scope)
        .await
        .map_err(ApiError::Ingestion)?;

    Ok(Json(IngestionStartedResponse { ingestion_id: job.id }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteUserDataRequest {
    pub email: String,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub services: Option<Vec<String>>,
    #[serde(default)]
    pub delete_sync_job: bool,
}

/// `POST /admin/delete-user-data` — clears a user's indexed data and,
/// optionally, their queued ingestion jobs; never aborts partway, every
/// service's outcome is reported even when an earlier one failed.
#[utoipa::path(post, path = "/admin/delete-user-data", responses((status = 200)), tag = "admin")]
pub async fn delete_user_data(
    _admin: AdminPrincipal,
    State(state): State<AppState>,
    Json(request): Json<DeleteUserDataRequest>,
) -> ApiResult<Json<DataDeletionResult>> {
    let coordinator = DeletionCoordinator::new(state.db.as_ref().clone(), NoopSearchIndexDeleter);
    let options = DeletionOptions { services_to_clear: request.services, delete_sync_job: request.delete_sync_job };
    let result = coordinator.delete_user_data(&request.email, request.user_id, options).await;
    Ok(Json(result))
}

/// `POST /admin/connector/:id/pause` — flips a connector's status to
/// `Paused` without deleting it.
#[utoipa::path(post, path = "/admin/connector/{id}/pause", responses((status = 200)), tag = "admin")]
pub async fn pause_connector(
    _admin: AdminPrincipal,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<assistant_contracts::Connector>> {
    let connector = state.db.get_connector(id).await?.ok_or(ApiError::Storage(assistant_storage::StorageError::ConnectorNotFound))?;
    let updated = state.db.update_connector_status(&connector.external_id, assistant_contracts::ConnectorStatus::Paused).await?;
    Ok(Json(updated))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/admin/service-account", post(create_service_account))
        .route("/admin/ingest-more-users", post(ingest_more_users))
        .route("/admin/slack/ingest-channels", post(slack_ingest_channels))
        .route("/admin/delete-user-data", post(delete_user_data))
        .route("/admin/connector/:id/pause", post(pause_connector))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_date_string_parses_to_none() {
        assert_eq!(parse_optional_date("").unwrap(), None);
    }

    #[test]
    fn well_formed_date_parses_to_midnight_utc() {
        let parsed = parse_optional_date("2026-01-15").unwrap().unwrap();
        assert_eq!(parsed.format("%Y-%m-%dT%H:%M:%S").to_string(), "2026-01-15T00:00:00");
    }

    #[test]
    fn malformed_date_is_a_bad_request() {
        let err = parse_optional_date("15/01/2026").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
