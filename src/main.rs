use std::sync::Arc;

mod app;
mod auth;
mod config;
mod db;
mod error;
mod state;

use crate::{
    auth::{providers::ProviderRegistry, repo::PgUserStore},
    config::AppConfig,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "authgate=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Arc::new(AppConfig::from_env()?);
    let db = db::connect(&config).await?;
    db::migrate(&db).await?;

    auth::password::warm_up();
    let providers = ProviderRegistry::from_config(&config.oauth)?;
    let listen_addr = config.listen_addr;
    let state = AppState::from_parts(config, Arc::new(PgUserStore::new(db)), providers)?;

    let app = app::build_app(state)?;
    app::serve(app, listen_addr).await
}
