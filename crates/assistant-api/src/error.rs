// HTTP-facing error taxonomy (spec.md §7's table, mapped onto status codes).
// Every crate below this one keeps its own error type and knows nothing of
// HTTP; this is the one seam where that gets translated.

use assistant_contracts::ErrorKind;
use assistant_core::CoreError;
use assistant_ingestion::IngestionError;
use assistant_storage::StorageError;
use assistant_tools::ToolsError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    Tools(#[from] ToolsError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, ErrorKind) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorKind::InvalidModel),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, ErrorKind::AuthInvalid),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, ErrorKind::UnauthorizedOperation),
            ApiError::Storage(StorageError::IngestionAlreadyRunning) => {
                (StatusCode::CONFLICT, ErrorKind::IngestionAlreadyRunning)
            }
            ApiError::Storage(StorageError::ConnectorNotFound) => {
                (StatusCode::NOT_FOUND, ErrorKind::ConnectorNotFound)
            }
            ApiError::Storage(StorageError::ToolNotFound) => {
                (StatusCode::NOT_FOUND, ErrorKind::ToolNotFound)
            }
            ApiError::Storage(StorageError::DuplicateGlobalProvider) => {
                (StatusCode::CONFLICT, ErrorKind::InvalidModel)
            }
            ApiError::Storage(StorageError::Database(_) | StorageError::Internal(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::ProviderTransport)
            }
            ApiError::Ingestion(IngestionError::InvalidScope(_)) => {
                (StatusCode::BAD_REQUEST, ErrorKind::InvalidModel)
            }
            ApiError::Ingestion(IngestionError::Storage(inner)) => match inner {
                StorageError::IngestionAlreadyRunning => {
                    (StatusCode::CONFLICT, ErrorKind::IngestionAlreadyRunning)
                }
                StorageError::ConnectorNotFound => (StatusCode::NOT_FOUND, ErrorKind::ConnectorNotFound),
                StorageError::ToolNotFound => (StatusCode::NOT_FOUND, ErrorKind::ToolNotFound),
                StorageError::DuplicateGlobalProvider => (StatusCode::CONFLICT, ErrorKind::InvalidModel),
                StorageError::Database(_) | StorageError::Internal(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::ProviderTransport)
                }
            },
            ApiError::Tools(_) => (StatusCode::BAD_GATEWAY, ErrorKind::ProviderTransport),
            ApiError::Core(e) => (
                match e {
                    CoreError::NoProviderConfigured => StatusCode::SERVICE_UNAVAILABLE,
                    CoreError::InvalidModel(_) => StatusCode::BAD_REQUEST,
                    CoreError::ProviderRateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
                    CoreError::ProviderTransport(_) | CoreError::Internal(_) => {
                        StatusCode::BAD_GATEWAY
                    }
                },
                e.kind(),
            ),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::ProviderTransport),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, ApiError::Storage(StorageError::Database(_) | StorageError::Internal(_)) | ApiError::Internal(_)) {
            tracing::error!(error = %self, "request failed");
        }
        let (status, kind) = self.status_and_kind();
        (status, Json(ErrorResponse { error: self.to_string(), kind })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn an_already_running_ingestion_maps_to_409() {
        let (status, kind) = ApiError::Storage(StorageError::IngestionAlreadyRunning).status_and_kind();
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(matches!(kind, ErrorKind::IngestionAlreadyRunning));
    }

    #[test]
    fn a_missing_connector_maps_to_404() {
        let (status, _) = ApiError::Storage(StorageError::ConnectorNotFound).status_and_kind();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn no_provider_configured_maps_to_503_not_a_bad_gateway() {
        let (status, _) = ApiError::Core(CoreError::NoProviderConfigured).status_and_kind();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn rate_limited_maps_to_429() {
        let (status, _) = ApiError::Core(CoreError::ProviderRateLimited("slow down".into())).status_and_kind();
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn bad_request_carries_the_message_through_display() {
        let err = ApiError::BadRequest("tenant_id is required".into());
        assert_eq!(err.to_string(), "tenant_id is required");
    }
}
