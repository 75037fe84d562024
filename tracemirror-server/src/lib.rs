//! # tracemirror server
//!
//! Process wiring for tracemirror: the recurrence driver runs in the
//! background while a small read-only HTTP API exposes the service registry
//! and the driver's status.

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

/// Build the full router: health probe plus the versioned API.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(routes::create_api_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
