// Admin login: exchanges the configured admin email/password for a JWT
// access/refresh pair, and lets a refresh token be redeemed for a new pair.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

use super::jwt::{issue_tokens, verify_token, TokenKind};
use super::password::verify_password;

#[derive(Debug, Clone)]
pub struct AuthRoutesState {
    pub auth: super::AuthConfig,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// `POST /auth/login` — admin email/password exchange for session tokens.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses((status = 200, body = TokenResponse), (status = 401)),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AuthRoutesState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let admin = state.auth.admin.as_ref().ok_or(ApiError::Unauthorized)?;

    if request.email != admin.email {
        return Err(ApiError::Unauthorized);
    }
    verify_password(&request.password, &admin.password_hash).map_err(|_| ApiError::Unauthorized)?;

    let tokens = issue_tokens(&state.auth.jwt, Uuid::nil()).map_err(|e| ApiError::Internal(e.into()))?;
    Ok(Json(TokenResponse { access_token: tokens.access_token, refresh_token: tokens.refresh_token }))
}

/// `POST /auth/refresh` — redeem a refresh token for a new token pair.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses((status = 200, body = TokenResponse), (status = 401)),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<AuthRoutesState>,
    Json(request): Json<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let claims = verify_token(&state.auth.jwt, &request.refresh_token, TokenKind::Refresh)
        .map_err(|_| ApiError::Unauthorized)?;

    let tokens = issue_tokens(&state.auth.jwt, claims.sub).map_err(|e| ApiError::Internal(e.into()))?;
    Ok(Json(TokenResponse { access_token: tokens.access_token, refresh_token: tokens.refresh_token }))
}

pub fn routes(state: AuthRoutesState) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .with_state(state)
}
