use axum::{body::Bytes, extract::State, Json};
use serde::Deserialize;
use service::{
    alias::{NewAlias, ProvisionedUser},
    errors::ServiceError,
};

use crate::{errors::ApiError, routes::parse_body, state::AppState};

#[derive(Debug, Default, Deserialize)]
pub struct GetPcUserRequest {
    #[serde(default)]
    pub alias: Option<String>,
}

pub async fn create_alias(State(state): State<AppState>) -> Result<Json<NewAlias>, ApiError> {
    Ok(Json(state.aliases.create_alias().await?))
}

/// Exchange an alias for a freshly created PC user, e.g. `{"alias":"F33P27ON"}`.
pub async fn get_pc_user(State(state): State<AppState>, body: Bytes) -> Result<Json<ProvisionedUser>, ApiError> {
    let req: GetPcUserRequest = parse_body(&body);
    let alias = req.alias.ok_or_else(|| ApiError::bad_request("alias value not specified"))?;

    match state.aliases.provision(&alias).await {
        Ok(user) => Ok(Json(user)),
        // an unknown alias is the client's mistake here, not a missing resource
        Err(ServiceError::NotFound(msg)) => Err(ApiError::bad_request(msg)),
        Err(e) => Err(e.into()),
    }
}
