//! The loopback control surface.
//!
//! An axum listener on `127.0.0.1:3030` with permissive CORS, exposing the
//! lifecycle operations as JSON plus a WebSocket for `eval`.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use qube_common::constants::CONTROL_ADDR;
use qube_runtime::Engine;
use tower_http::cors::CorsLayer;

use crate::handlers;

/// Builds the control-surface router.
#[must_use]
pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/list", get(handlers::list))
        .route("/stop", post(handlers::stop_by_body))
        .route("/stop/{name}", post(handlers::stop_by_name))
        .route("/start", post(handlers::start_by_body))
        .route("/start/{name}", post(handlers::start_by_name))
        .route("/delete", post(handlers::delete))
        .route("/info", post(handlers::info))
        .route("/images", get(handlers::images))
        .route("/volumes", get(handlers::volumes))
        .route("/eval/{name}/{action}", get(handlers::eval_socket))
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

/// Serves the control surface until the listener fails.
///
/// # Errors
///
/// Returns an error if binding or serving the loopback socket fails.
pub async fn serve(engine: Arc<Engine>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(CONTROL_ADDR).await?;
    tracing::info!("control surface listening at http://{CONTROL_ADDR}");
    axum::serve(listener, router(engine)).await?;
    Ok(())
}
