//! Error handling for the axum server.
//! Maps engine and provider failures to stable HTTP status codes with
//! JSON error bodies.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use vidsum_core::StoreError;

use crate::state::ProviderError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed URL or invalid request knobs.
    #[error("{0}")]
    InvalidInput(String),
    /// Selected backend lacks required configuration.
    #[error("missing configuration: {0}")]
    ConfigMissing(String),
    /// Maintainer endpoints require an admin token to be configured.
    #[error("processing lock admin token is not configured")]
    AdminTokenUnconfigured,
    #[error("missing maintainer token")]
    MissingToken,
    #[error("invalid maintainer token")]
    InvalidToken,
    #[error("{0}")]
    NotFound(String),
    /// Business conflicts: lock contention, retry guards, force thresholds.
    #[error("{0}")]
    Conflict(String),
    /// Backend cannot be constructed right now.
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::ConfigMissing(detail) => Self::ConfigMissing(detail),
            ProviderError::Unavailable(detail) => Self::Unavailable(detail),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidInput(_) | ApiError::ConfigMissing(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingToken => StatusCode::UNAUTHORIZED,
            ApiError::InvalidToken => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::AdminTokenUnconfigured | ApiError::Unavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };

        let body = json!({
            "error": self.to_string(),
            "code": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
