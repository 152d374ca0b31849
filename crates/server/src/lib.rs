//! HTTP surface for the liquidation monitor.
//!
//! Thin presentation layer: handlers validate, delegate to the core services,
//! and map the error taxonomy onto status codes. No decision logic lives here.

mod error;
mod routes;
mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;

/// Build the full route table.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/escrows", post(routes::register_escrow).get(routes::list_escrows))
        .route("/positions", get(routes::list_positions))
        .route("/positions/by-collateral/:asset", get(routes::positions_by_collateral))
        .route("/positions/:escrow_address", get(routes::get_position))
        .route("/sync/:escrow_address", post(routes::force_sync))
        .route("/price-update", post(routes::price_update))
        .route("/prices", get(routes::prices))
        .with_state(state)
}

/// Serve until the shutdown future resolves.
pub async fn serve(
    addr: &str,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr, "HTTP server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
