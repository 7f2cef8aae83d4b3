use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::{pc::PcError, types::ErrorBody};
use service::errors::ServiceError;
use thiserror::Error;
use tracing::error;

/// Error responses of the HTTP surface.
///
/// The sample's clients expect three shapes: `{"error": ...}` JSON for
/// request problems, a plain-text diagnostic when PC fails, and an empty body
/// for rejected callbacks.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{1}")]
    Json(StatusCode, String),
    #[error("{1}")]
    Text(StatusCode, String),
    #[error("{0}")]
    Empty(StatusCode),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::Json(StatusCode::BAD_REQUEST, msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::Json(StatusCode::NOT_FOUND, msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Json(StatusCode::INTERNAL_SERVER_ERROR, msg.into())
    }

    pub fn pc_failed(e: &PcError) -> Self {
        Self::Text(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Call to PC failed. Error code: {}, error description: {}", e.code(), e.description()),
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Json(status, _) | ApiError::Text(status, _) | ApiError::Empty(status) => *status,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::InvalidArgument(msg) => ApiError::bad_request(msg),
            ServiceError::NotFound(msg) => ApiError::not_found(msg),
            ServiceError::Io(_) => ApiError::internal(e.to_string()),
            ServiceError::Pc(ref pc) => ApiError::pc_failed(pc),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        }
        match self {
            ApiError::Json(status, msg) => (status, Json(ErrorBody::new(msg))).into_response(),
            ApiError::Text(status, msg) => (status, msg).into_response(),
            ApiError::Empty(status) => status.into_response(),
        }
    }
}
