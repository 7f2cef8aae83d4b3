use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use service::transactions::Status;

use crate::{errors::ApiError, state::AppState};

#[derive(Debug, Serialize)]
pub struct TransactionStatusOutput {
    pub transaction_id: String,
    pub status: Status,
}

/// Polled by the UI while waiting for the user to sign.
pub async fn transaction_status(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<TransactionStatusOutput>, ApiError> {
    match state.tracker.get_status(None, Some(&transaction_id)).await? {
        Some(status) => Ok(Json(TransactionStatusOutput { transaction_id, status })),
        None => Err(ApiError::not_found("transaction not found")),
    }
}
