use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use super::handlers::{self, AppState};

/// Create the main router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Backend metrics
        .route("/connection", get(handlers::connection))
        .route("/dashboard", get(handlers::dashboard))
        .route("/sessions", get(handlers::sessions))
        .route("/backend-health", get(handlers::backend_health))
        .route("/metrics", get(handlers::metrics))
        // Local stats
        .route("/insights", get(handlers::insights))
        .route("/insights/refresh", post(handlers::refresh_insights))
        .route("/config", get(handlers::get_config))
        .route("/health", get(handlers::health_check));

    // CORS layer for local dashboards on other ports
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api_routes)
        .layer(cors)
        .with_state(state)
}
