use crate::handlers::{
    ask_handler, cache_stats, clear_cache, clear_session, health_check, service_health,
    session_history,
};
use axum::{Router, routing::get, routing::post};

/// Creates and configures all application routes
pub fn create_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/health", get(service_health))
        .route("/api/ask", post(ask_handler))
        .route("/api/clear", post(clear_session))
        .route("/api/history", get(session_history))
        .route("/api/cache/stats", get(cache_stats))
        .route("/api/cache/clear", post(clear_cache))
}
