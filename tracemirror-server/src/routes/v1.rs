use axum::{Router, routing::get};

use crate::{
    AppState,
    handlers::{services::list_services_handler, sync::sync_status_handler},
};

/// Create all v1 API routes
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/services", get(list_services_handler))
        .route("/sync/status", get(sync_status_handler))
}
