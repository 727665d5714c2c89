//! HTTP surface.
//!
//! Thin axum handlers over [`PortfolioService`](crate::valuation::PortfolioService)
//! and [`HistoryService`](crate::history::HistoryService). Every endpoint is a
//! `GET` with query parameters; CORS is open.

mod error;
mod handlers;
mod state;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use log::info;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::config::ServerSettings;

pub use error::ApiError;
pub use handlers::{HistoryQuery, WalletQuery};
pub use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/portfolio", get(handlers::portfolio))
        .route("/lp-positions", get(handlers::lp_positions))
        .route("/presales", get(handlers::presales))
        .route("/staking", get(handlers::staking))
        .route("/history", get(handlers::history))
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Serves until `cancellation_token` fires, then drains open connections.
pub async fn run_server(
    settings: &ServerSettings,
    state: AppState,
    cancellation_token: CancellationToken,
) -> Result<()> {
    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancellation_token.cancelled().await })
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped");
    Ok(())
}
