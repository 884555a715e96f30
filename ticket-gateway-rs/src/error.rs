//! Error mapping for the HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::backend::BackendError;
use crate::validation::ApiValidationError;

/// Body of every failed response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Request failure as seen by a client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Client input was rejected before any external call.
    #[error(transparent)]
    Validation(#[from] ApiValidationError),

    /// The ticketing backend failed or answered with an error.
    #[error(transparent)]
    Upstream(#[from] BackendError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Validation(err) => tracing::debug!("Rejected request: {}", err),
            ApiError::Upstream(err) => tracing::error!("Backend call failed: {}", err),
        }

        (
            status,
            Json(ErrorResponse {
                success: false,
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
