use axum::{extract::State, Json};
use service::qr::QrUser;

use crate::{errors::ApiError, state::AppState};

/// Called by the sample UI; answers `{user_id, user_qr}`.
pub async fn create_pc_user(State(state): State<AppState>) -> Result<Json<QrUser>, ApiError> {
    Ok(Json(state.qr_users.create_user().await?))
}
