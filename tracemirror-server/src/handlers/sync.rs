use axum::{Json, extract::State};
use tracemirror_core::sync::SyncStatus;

use crate::AppState;

pub async fn sync_status_handler(
    State(state): State<AppState>,
) -> Json<SyncStatus> {
    Json(state.sync_status().snapshot().await)
}
