//! HTTP server implementation

use super::handlers::{del_value, get_value, keys, list, set_value, AppState};
use crate::store::Store;
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application router over `store`
pub fn router(store: Arc<dyn Store>, request_timeout: Option<Duration>) -> Router {
    let state = AppState {
        store,
        request_timeout,
    };

    Router::new()
        .route(
            "/:dbnum/:key",
            get(get_value).put(set_value).post(set_value).delete(del_value),
        )
        .route("/:dbnum/keys/:pattern", get(keys))
        .route("/:dbnum/list/:pattern", get(list))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the REST mirror until `shutdown` fires
pub async fn run_web_server(
    addr: &str,
    store: Arc<dyn Store>,
    request_timeout: Option<Duration>,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = router(store, request_timeout);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding HTTP listener on {}", addr))?;
    info!("REST mirror available at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("REST mirror shutting down");
        })
        .await?;

    Ok(())
}
