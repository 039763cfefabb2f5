// LLM Provider Dispatch and Agentic Answering Pipeline — HTTP surface.
// Boots the connector registry, ingestion orchestrator, and the driver
// resolved from whichever backend's env vars are set, then serves the
// whole module set behind one router.

mod admin;
mod auth;
mod chat;
mod common;
mod connectors;
mod error;
mod oauth;
mod stubs;

use std::sync::Arc;

use anyhow::{Context, Result};
use assistant_agentic::pipeline::AgenticPipeline;
use assistant_contracts::*;
use assistant_core::{Driver, EnvConfig, Registry};
use assistant_ingestion::{CleanupLoop, IngestionConfig, IngestionOrchestrator};
use assistant_storage::{generate_encryption_key, Database, EncryptionService};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use stubs::{NoopActiveResourceProbe, NoopDriver, NoopIngestionWorker};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    active_provider: Option<String>,
}

#[derive(Clone)]
struct HealthState {
    active_provider: Option<String>,
}

async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", version: env!("CARGO_PKG_VERSION"), active_provider: state.active_provider.clone() })
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::routes::login,
        auth::routes::refresh,
        oauth::start,
        oauth::create_provider,
        connectors::create_connector,
        connectors::list_connectors,
        connectors::get_connector,
        connectors::delete_connector,
        connectors::update_tools_status,
        connectors::list_connector_tools,
        admin::create_service_account,
        admin::ingest_more_users,
        admin::slack_ingest_channels,
        admin::delete_user_data,
        admin::pause_connector,
        chat::answer,
        chat::cancel,
    ),
    components(schemas(
        auth::routes::LoginRequest,
        auth::routes::RefreshRequest,
        auth::routes::TokenResponse,
        Connector,
        CreateConnectorRequest,
        ConnectorStatus,
        SourceApp,
        AuthMode,
        Credentials,
        connectors::McpTransportConfig,
        connectors::CreateConnectorBody,
        Tool,
        ToolStatusUpdate,
        PartialToolUpdateResult,
        ToolUpdateFailure,
        OAuthProvider,
        oauth::StartOAuthQuery,
        IngestionScope,
        admin::ServiceAccountResponse,
        admin::IngestMoreUsersRequest,
        admin::SlackIngestChannelsRequest,
        admin::IngestionStartedResponse,
        admin::DeleteUserDataRequest,
        chat::AnswerOrSearchRequest,
        chat::ChatMessage,
        chat::ChatRole,
        error::ErrorResponse,
        ErrorKind,
    )),
    tags(
        (name = "auth", description = "Admin session endpoints"),
        (name = "oauth", description = "Connector OAuth handshake"),
        (name = "connectors", description = "Connector lifecycle and tool catalog"),
        (name = "admin", description = "Service-account, ingestion scope, and deletion admin endpoints"),
        (name = "chat", description = "Agentic answering pipeline"),
    ),
    info(
        title = "Assistant API",
        version = "0.1.0",
        description = "LLM provider dispatch, connector lifecycle, and agentic answering pipeline",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "assistant_api=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("assistant-api starting...");

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL environment variable required")?;
    let db = Database::from_url(&database_url).await.context("failed to connect to database")?;
    tracing::info!("connected to database");
    db.migrate().await.context("failed to run database migrations")?;
    tracing::info!("database migrations applied");

    let encryption = match EncryptionService::from_env() {
        Ok(svc) => {
            tracing::info!("encryption service initialized");
            Arc::new(svc)
        }
        Err(e) => {
            tracing::warn!("CREDENTIALS_ENCRYPTION_KEY not set ({e}), using an ephemeral key for this process only");
            let ephemeral = generate_encryption_key("ephemeral");
            Arc::new(EncryptionService::new(&ephemeral, &[]).context("failed to build ephemeral encryption service")?)
        }
    };

    let env_config = EnvConfig::from_env();
    let registry = Registry::new(env_config.clone());
    let active_provider = registry.active_provider();

    let driver: Box<dyn Driver> = match active_provider {
        Some(backend) => match assistant_agentic::provider_factory::build_driver(&env_config, backend, None) {
            Ok(driver) => {
                tracing::info!(?backend, "LLM provider resolved");
                driver
            }
            Err(e) => {
                tracing::warn!(?backend, error = %e, "failed to build driver for the resolved backend, chat endpoints will error");
                Box::new(NoopDriver)
            }
        },
        None => {
            tracing::warn!("no LLM provider configured, chat endpoints will error until one is");
            Box::new(NoopDriver)
        }
    };

    let default_model_id =
        registry.available_models().first().map(|d| d.model_id.clone()).unwrap_or_else(|| "unconfigured".to_string());
    let pipeline = AgenticPipeline::new(driver, default_model_id);

    let db = Arc::new(db);

    let ingestion_config = IngestionConfig::from_env();
    let orchestrator = Arc::new(IngestionOrchestrator::new((*db).clone(), NoopIngestionWorker, ingestion_config.clone()));
    CleanupLoop::new(NoopActiveResourceProbe, &ingestion_config).spawn();

    let auth_config = auth::AuthConfig::from_env();
    tracing::info!(mode = ?auth_config.mode, "admin auth mode configured");

    let auth_state = auth::routes::AuthRoutesState { auth: auth_config.clone() };
    let oauth_state = oauth::AppState { db: db.clone(), encryption: encryption.clone() };
    let connectors_state = connectors::AppState { db: db.clone(), encryption: encryption.clone() };
    let admin_state =
        admin::AppState { db: db.clone(), encryption: encryption.clone(), orchestrator: orchestrator.clone(), auth: auth_config };
    let chat_state = chat::ChatState::new(pipeline);
    let health_state = HealthState { active_provider: active_provider.map(|b| format!("{b:?}")) };

    let app = Router::new()
        .route("/health", get(health).with_state(health_state))
        .merge(auth::routes::routes(auth_state))
        .merge(oauth::routes(oauth_state))
        .merge(connectors::routes(connectors_state))
        .merge(admin::routes(admin_state))
        .merge(chat::routes(chat_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await.context("failed to bind to address")?;
    tracing::info!("listening on {addr}");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
