use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use carebook::config::AppConfig;
use carebook::db;
use carebook::handlers;
use carebook::services::changes::spawn_cache_invalidator;
use carebook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let state = Arc::new(AppState::new(conn, config.clone()));

    let _invalidator = spawn_cache_invalidator(state.changes_tx.subscribe(), state.cache.clone());

    tracing::info!(
        initial_delay_ms = config.verify_initial_delay_ms,
        retry_delay_ms = config.verify_retry_delay_ms,
        max_attempts = config.verify_max_attempts,
        "booking verifier configured"
    );

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
