use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use common::types::Health;

use crate::state::AppState;

pub mod alias;
pub mod auth;
pub mod callback;
pub mod qr;
pub mod transactions;

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn metrics() -> (StatusCode, String) {
    match service::metrics::encode_metrics() {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// Decode an optional JSON request body. Missing fields surface as `None` so
/// handlers can answer with their own `{"error": ...}` messages.
pub(crate) fn parse_body<T: serde::de::DeserializeOwned + Default>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap_or_default()
}

/// Build the full application router: PC callback, alias and QR
/// personalization, authentication, status lookup, and the static sample UI as fallback.
pub fn build_router(state: AppState, cors: CorsLayer, ui_dir: &str) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics));

    let pc = Router::new()
        .route("/pc_callback", post(callback::pc_callback))
        .route("/pers/alias/create", post(alias::create_alias))
        .route("/pers/alias/get_pc_user", post(alias::get_pc_user))
        .route("/create_pc_user", post(qr::create_pc_user))
        .route("/start_authentication", post(auth::start_authentication))
        .route("/finish_authentication", post(auth::finish_authentication))
        .route("/transactions/:id/status", get(transactions::transaction_status));

    public
        .merge(pc)
        .fallback_service(ServeDir::new(ui_dir))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                // 5xx are logged at ERROR
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
