//! campuswatch -- geotagged campus incident reporting with spatial and
//! temporal analytics.
//!
//! This crate provides the incident model, a SQLite incident store, the
//! analytics engine (heatmap, DBSCAN clustering, trends, proximity buffers)
//! and the HTTP API that serves them.

pub mod analytics;
pub mod api;
pub mod config;
pub mod incident;
pub mod storage;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::CampusWatchConfig;

/// Start the campuswatch HTTP server and run until Ctrl-C.
pub async fn serve(config: &CampusWatchConfig) -> Result<()> {
    config
        .analytics
        .validate()
        .context("invalid analytics configuration")?;

    // 1. Initialize Storage
    let db_path = &config.storage.db_path;
    info!(db = %db_path.display(), "Initializing database");
    let (store, seeded) = storage::open_store(db_path, config.storage.seed_when_empty)?;
    if seeded > 0 {
        info!(rows = seeded, "database was empty, sample incidents inserted");
    }

    // 2. Start API Server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address `{}`", config.server.bind))?;
    let state = api::state::AppState::from_store(store, config.analytics.clone());
    let app = api::router(state, &config.server);

    info!(%addr, "campuswatch listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("campuswatch stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
