// Connector OAuth: `StartOAuth`/`CreateOAuthProvider` (spec.md §4.6), grounded
// on the teacher's `auth/oauth.rs` manual-reqwest style — adapted for a
// connector-facing flow (binding an external data source to a tenant)
// rather than an admin-dashboard login.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use assistant_contracts::{ErrorKind, OAuthProvider, SourceApp};
use assistant_storage::{Database, EncryptionService, NewOAuthProvider};

use crate::error::{ApiError, ApiResult};

const STATE_COOKIE_MAX_AGE_SECS: i64 = 600;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub encryption: Arc<EncryptionService>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartOAuthQuery {
    pub app: SourceApp,
    #[serde(default)]
    pub workspace_id: Option<Uuid>,
}

/// `{app, random}`, base64url-encoded into both the `state` cookie and the
/// value handed to the provider, so the callback can recover it without a
/// server-side session store.
#[derive(Debug, Serialize, Deserialize)]
struct StatePayload {
    app: SourceApp,
    random: String,
}

fn app_slug(app: SourceApp) -> &'static str {
    match app {
        SourceApp::Mail => "mail",
        SourceApp::Drive => "drive",
        SourceApp::Chat => "chat",
        SourceApp::Sharepoint => "sharepoint",
        SourceApp::Slack => "slack",
        SourceApp::GenericMcp => "generic_mcp",
    }
}

fn random_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Authorization URL for `app`, or `None` if it isn't OAuth-capable.
fn authorization_url(app: SourceApp, client_id: &str, redirect_uri: &str, state: &str, code_challenge: &str) -> Option<String> {
    match app {
        SourceApp::Mail | SourceApp::Drive | SourceApp::Chat => Some(format!(
            "https://accounts.google.com/o/oauth2/v2/auth?client_id={client_id}&redirect_uri={redirect_uri}\
             &response_type=code&scope=openid%20email%20profile&state={state}&access_type=offline\
             &prompt=consent&code_challenge={code_challenge}&code_challenge_method=S256",
        )),
        SourceApp::Sharepoint => Some(format!(
            "https://login.microsoftonline.com/common/oauth2/v2.0/authorize?client_id={client_id}\
             &redirect_uri={redirect_uri}&response_type=code&scope=openid%20email%20profile&state={state}\
             &code_challenge={code_challenge}&code_challenge_method=S256",
        )),
        SourceApp::Slack => Some(format!(
            "https://slack.com/oauth/v2/authorize?client_id={client_id}&redirect_uri={redirect_uri}\
             &state={state}",
        )),
        SourceApp::GenericMcp => None,
    }
}

/// `POST /oauth/start?app=…` — sets `{app}-state`/`{app}-code-verifier`
/// cookies (`Max-Age=600`, `HttpOnly`, `Secure`) and redirects to the
/// provider's authorization endpoint.
#[utoipa::path(
    post,
    path = "/oauth/start",
    params(("app" = SourceApp, Query, description = "source app to connect")),
    responses((status = 302), (status = 400)),
    tag = "oauth"
)]
pub async fn start(
    State(state): State<AppState>,
    Query(query): Query<StartOAuthQuery>,
    jar: CookieJar,
) -> ApiResult<Response> {
    let provider = state
        .db
        .find_provider_for_app(query.workspace_id.unwrap_or(Uuid::nil()), query.app)
        .await?
        .ok_or_else(|| ApiError::BadRequest(format!("no OAuth provider configured for {:?}", query.app)))?;

    let random = random_token();
    let payload = StatePayload { app: query.app, random };
    let state_value = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).map_err(|e| ApiError::Internal(e.into()))?);
    let code_verifier = random_token();
    let code_challenge = {
        use sha2::{Digest, Sha256};
        URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
    };

    let redirect_uri = std::env::var("OAUTH_REDIRECT_URI").unwrap_or_else(|_| "http://localhost:8080/oauth/callback".into());
    let url = authorization_url(query.app, &provider.client_id, &redirect_uri, &state_value, &code_challenge)
        .ok_or_else(|| ApiError::BadRequest(format!("{:?} is not OAuth-capable", query.app)))?;

    let slug = app_slug(query.app);
    let state_cookie = Cookie::build((format!("{slug}-state"), state_value))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(STATE_COOKIE_MAX_AGE_SECS))
        .path("/")
        .build();
    let verifier_cookie = Cookie::build((format!("{slug}-code-verifier"), code_verifier))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(STATE_COOKIE_MAX_AGE_SECS))
        .path("/")
        .build();

    let jar = jar.add(state_cookie).add(verifier_cookie);
    Ok((jar, Redirect::to(&url)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub app: SourceApp,
    pub state: String,
    #[allow(dead_code)]
    pub code: String,
}

/// `GET /oauth/callback` — verifies the round-tripped `state` cookie before
/// accepting the authorization code (spec.md §8 S5/S6). Token exchange
/// itself is out of scope here: the core "consumes a provider library
/// abstraction" rather than re-implementing OAuth cryptography, so this
/// only validates the handshake and leaves credential persistence to
/// whichever caller already has a token exchanger for `app`.
pub async fn callback(jar: CookieJar, Query(query): Query<OAuthCallbackQuery>) -> ApiResult<impl IntoResponse> {
    let slug = app_slug(query.app);
    let cookie_state = jar
        .get(&format!("{slug}-state"))
        .map(|c| c.value().to_string())
        .ok_or(ApiError::Unauthorized)?;

    if cookie_state != query.state {
        return Err(ApiError::Unauthorized);
    }

    let decoded = URL_SAFE_NO_PAD
        .decode(&query.state)
        .ok()
        .and_then(|bytes| serde_json::from_slice::<StatePayload>(&bytes).ok())
        .ok_or(ApiError::Unauthorized)?;

    if decoded.app != query.app {
        return Err(ApiError::Unauthorized);
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct CreateOAuthProviderForm {
    pub workspace_id: Uuid,
    pub app: SourceApp,
    pub client_id: String,
    pub client_secret: String,
    pub scopes: String,
    #[serde(default)]
    pub is_global: bool,
}

/// `POST /oauth/create-provider` (form) — records tenant or global client
/// credentials for `app`. Rejects a second global provider for the same
/// app with `409 Conflict` (SPEC_FULL.md's decision on the source's
/// ambiguous "first one wins" behavior).
#[utoipa::path(
    post,
    path = "/oauth/create-provider",
    responses((status = 201), (status = 409)),
    tag = "oauth"
)]
pub async fn create_provider(
    State(state): State<AppState>,
    Form(form): Form<CreateOAuthProviderForm>,
) -> ApiResult<Json<OAuthProvider>> {
    let client_secret_encrypted = state
        .encryption
        .encrypt_string(&form.client_secret)
        .map_err(ApiError::Internal)?;

    let provider = state
        .db
        .create_oauth_provider(NewOAuthProvider {
            workspace_id: form.workspace_id,
            app: form.app,
            client_id: form.client_id,
            client_secret_encrypted,
            scopes: form.scopes.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            is_global: form.is_global,
        })
        .await?;

    Ok(Json(provider))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/oauth/start", post(start))
        .route("/oauth/callback", get(callback))
        .route("/oauth/create-provider", post(create_provider))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_family_apps_request_offline_access_and_pkce() {
        let url = authorization_url(SourceApp::Mail, "client", "https://example.com/callback", "state123", "challenge").unwrap();
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("code_challenge=challenge"));
    }

    #[test]
    fn slack_uses_its_own_authorize_endpoint() {
        let url = authorization_url(SourceApp::Slack, "client", "https://example.com/callback", "state123", "challenge").unwrap();
        assert!(url.starts_with("https://slack.com/oauth/v2/authorize"));
    }

    #[test]
    fn generic_mcp_is_not_oauth_capable() {
        assert!(authorization_url(SourceApp::GenericMcp, "c", "r", "s", "ch").is_none());
    }
}
