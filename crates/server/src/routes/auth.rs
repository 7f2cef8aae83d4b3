use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use service::transactions::Status;

use crate::{errors::ApiError, routes::parse_body, state::AppState};

#[derive(Debug, Default, Deserialize)]
pub struct AuthRequest {
    #[serde(default)]
    pub pc_user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartOutput {
    pub transaction_id: String,
}

#[derive(Debug, Serialize)]
pub struct FinishOutput {
    pub status: Status,
}

fn user_id(body: &[u8]) -> Result<String, ApiError> {
    let req: AuthRequest = parse_body(body);
    req.pc_user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("pc_user_id not specified"))
}

pub async fn start_authentication(State(state): State<AppState>, body: Bytes) -> Result<Json<StartOutput>, ApiError> {
    let user_id = user_id(&body)?;
    let transaction_id = state.auth.start(&user_id).await?;
    Ok(Json(StartOutput { transaction_id }))
}

/// `200` once the user's last transaction is confirmed, `401` while it is
/// still created or was declined.
pub async fn finish_authentication(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let user_id = user_id(&body)?;
    let status = state.auth.finish(&user_id).await?;
    if status == Status::Confirmed {
        return Ok(Json(FinishOutput { status }).into_response());
    }
    let body = serde_json::json!({ "error": "authentication not confirmed", "status": status });
    Ok((StatusCode::UNAUTHORIZED, Json(body)).into_response())
}
