use std::{net::SocketAddr, path::Path, sync::Arc};

use axum::Router;
use common::pc::PcClient;
use configs::AppConfig;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::routes;
use crate::state::{AppState, StateParts};
use service::{auth::AuthConfig, storage::JsonFileStore};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn bind_addr(cfg: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", cfg.server.host, cfg.server.port).parse()?)
}

/// Wire the file stores and the PC client into the handler state.
pub fn build_state(cfg: &AppConfig) -> anyhow::Result<AppState> {
    let pc = PcClient::new(cfg.pc.url.clone(), cfg.pc.system_id.clone(), cfg.pc.timeout())?;
    Ok(AppState::new(StateParts {
        transaction_store: Arc::new(JsonFileStore::new(&cfg.storage.transaction_file)),
        alias_store: Arc::new(JsonFileStore::new(&cfg.storage.alias_file)),
        pc: Arc::new(pc),
        auth: AuthConfig {
            transaction_text: cfg.pc.transaction_text.clone(),
            callback_url: cfg.pc.callback_url.clone(),
        },
        serialize_writes: cfg.storage.serialize_writes,
    }))
}

/// Public entry: build the app and run the HTTP server
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    common::env::ensure_env(
        &cfg.server.ui_dir,
        &[Path::new(&cfg.storage.transaction_file), Path::new(&cfg.storage.alias_file)],
    )
    .await?;

    let state = build_state(&cfg)?;
    let app: Router = routes::build_router(state, build_cors(), &cfg.server.ui_dir);

    let addr = bind_addr(&cfg)?;
    info!(
        %addr,
        pc_url = %cfg.pc.url,
        storage = %cfg.storage.transaction_file,
        serialize_writes = cfg.storage.serialize_writes,
        "starting pc sample server"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
