use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::metrics_middleware;
use super::{capabilities, handlers, nodes};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/status", get(handlers::get_status))
        // Node registry
        .route("/nodes", post(nodes::register_node).get(nodes::list_nodes))
        .route("/nodes/{id}", get(nodes::get_node).delete(nodes::deregister_node))
        .route("/nodes/{id}/heartbeat", post(nodes::heartbeat))
        // Capabilities
        .route("/capabilities", get(capabilities::get_capabilities))
        .route("/hardware", get(capabilities::list_hardware));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
