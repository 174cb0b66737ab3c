//! # API Routes
//!
//! Route definitions for the payment API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // API v1 routes
        .nest("/api/v1", api_v1_routes())
        // Gateway-facing routes: async webhook + browser return
        .route("/webhook/gateway", post(handlers::gateway_webhook))
        .route("/checkout/return", post(handlers::gateway_return))
        // Middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        // State
        .with_state(state)
}

/// API v1 routes
fn api_v1_routes() -> Router<AppState> {
    Router::new().route("/checkout", post(handlers::create_checkout))
}
