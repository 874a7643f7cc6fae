use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session control
        .route("/live/:channel", post(handlers::start_live))
        .route("/archive", post(handlers::start_archive))
        .route("/stop", post(handlers::stop))
        .route("/status", get(handlers::get_status))
        // Archive search
        .route("/recordings", get(handlers::search_recordings))
        // The viewer page is served from elsewhere
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
