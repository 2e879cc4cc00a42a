//! Journal HTTP server: route table and serve loop.

use axum::Router;
use axum::routing::{delete, get, post};
use tokio::sync::broadcast;
use tracing::{info, instrument};

use super::{ApiState, handlers};

/// Build the JSON API router.
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        // Ledger
        .route("/trades", get(handlers::list_trades).post(handlers::create_trade))
        // Any id, including "reset" or "import", reaches delete_trade.
        .route("/trades/:id", delete(handlers::delete_trade))
        .route("/ledger/reset", post(handlers::reset))
        .route("/ledger/import", post(handlers::import))
        .route("/reload", post(handlers::reload))
        .route("/save", post(handlers::save))
        // Statistics
        .route("/summary", get(handlers::summary))
        .route("/outcomes", get(handlers::outcomes))
        .route("/breakdown/:key", get(handlers::breakdown))
        .route("/trend", get(handlers::trend))
        // Export
        .route("/export/csv", get(handlers::export_csv))
        .route("/export/json", get(handlers::export_json))
        // Meta / probes
        .route("/meta", get(handlers::meta))
        .route("/live", get(handlers::liveness))
        .route("/ready", get(handlers::readiness))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
}

/// Serve the API on `bind_address` until `shutdown_rx` fires.
#[instrument(skip(state, shutdown_rx))]
pub async fn serve(
    state: ApiState,
    bind_address: &str,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(bind_address).await?;

    info!(address = %listener.local_addr()?, "Journal API started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    Ok(())
}
