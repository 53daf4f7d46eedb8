use std::sync::Arc;

use anyhow::Context;
use rustytrack::{
    build_app,
    config::ServerConfig,
    logging,
    tracking::{InMemoryStore, WorkoutTracker},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("failed to load configuration")?;
    logging::init(config.log_format).context("failed to install tracing subscriber")?;

    let store = Arc::new(InMemoryStore::new());
    let tracker = WorkoutTracker::new(store, config.tracker.clone());
    let app = build_app(tracker);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(
        addr = %config.bind_addr,
        route_budget = config.tracker.route_budget,
        default_weight_kg = config.tracker.default_weight_kg,
        "listening"
    );

    axum::serve(listener, app.into_make_service())
        .await
        .context("server crashed")?;
    Ok(())
}
