//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Request body headroom on top of the file size ceiling, covering the
/// multipart boundaries, part headers, and text fields (64 KiB).
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.upload.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let api_routes = Router::new()
        // Health check (intentionally unauthenticated for probes)
        .route("/v1/health", get(handlers::health_check))
        .route(
            "/v1/uploads",
            post(handlers::create_upload).layer(DefaultBodyLimit::max(body_limit)),
        );

    let mut router = Router::new().merge(api_routes);

    // Conditionally add the metrics endpoint based on config.
    // SECURITY: when enabled, restrict /metrics to authorized scraper IPs
    // at the infrastructure level.
    if state.config.server.metrics_enabled {
        router = router.merge(Router::new().route("/metrics", get(metrics_handler)));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
