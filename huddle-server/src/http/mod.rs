//! HTTP server module

mod api;

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::ws::ws_handler;

pub use api::HealthResponse;

/// Create the HTTP router with all routes configured
///
/// When a static directory is configured, every unmatched path is served
/// from it; otherwise unmatched paths return 404.
pub fn create_router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();

    let router = Router::new()
        .route("/api/health", get(api::health))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}
