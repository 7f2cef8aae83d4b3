use axum::{body::Bytes, extract::State, http::StatusCode};
use service::callback::CallbackError;
use tracing::debug;

use crate::{errors::ApiError, state::AppState};

/// Receiver for PC transaction callbacks.
///
/// `400` with an empty body for anything that is not a v3 transaction
/// callback, `500` when the status cannot be stored, `200` otherwise
/// (including callbacks that carry a PC error and are ignored).
pub async fn pc_callback(State(state): State<AppState>, body: Bytes) -> Result<StatusCode, ApiError> {
    match state.callbacks.handle(&body).await {
        Ok(outcome) => {
            debug!(?outcome, "callback handled");
            Ok(StatusCode::OK)
        }
        Err(CallbackError::Rejected(reason)) => {
            debug!(%reason, "callback rejected");
            Err(ApiError::Empty(StatusCode::BAD_REQUEST))
        }
        Err(CallbackError::Store(e)) => Err(ApiError::Text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}
