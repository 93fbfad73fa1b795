//! HTTP prediction service.

pub mod http;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::serving::Models;

/// Shared application state. Read-only after construction, so handlers need no locks.
#[derive(Debug)]
pub struct AppState {
    pub models: Models,
}

impl AppState {
    pub fn new(models: Models) -> Self {
        Self { models }
    }
}

/// Create the API router. `max_concurrent_requests` bounds in-flight
/// requests across all routes together.
pub fn create_router(state: Arc<AppState>, max_concurrent_requests: usize) -> Router {
    Router::new()
        .route("/", get(http::root))
        .route("/predict/churn", post(http::predict_churn))
        .route("/predict/segment", post(http::predict_segment))
        .route("/predict/forecast", post(http::predict_forecast))
        // Middleware
        .layer(GlobalConcurrencyLimitLayer::new(max_concurrent_requests.max(1)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server; returns after Ctrl-C once in-flight requests finish.
pub async fn serve(
    addr: &str,
    state: Arc<AppState>,
    max_concurrent_requests: usize,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(state, max_concurrent_requests);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "prediction service listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("prediction service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
