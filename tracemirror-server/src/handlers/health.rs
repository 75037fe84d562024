use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::AppState;

/// Liveness plus a registry round trip when a registry is configured.
pub async fn health_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<Value>) {
    let sync = state.sync_status().snapshot().await;
    let mut health_status = json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {
            "sync": { "state": sync.state },
        }
    });

    let mut is_unhealthy = false;
    match state.registry() {
        Some(registry) => {
            match registry.ping().await {
                Ok(()) => {
                    health_status["checks"]["registry"] =
                        json!({ "status": "healthy" });
                }
                Err(e) => {
                    health_status["checks"]["registry"] = json!({
                        "status": "unhealthy",
                        "error": e.to_string(),
                    });
                    is_unhealthy = true;
                }
            }
        }
        None => {
            health_status["checks"]["registry"] =
                json!({ "status": "disabled" });
        }
    }

    if is_unhealthy {
        health_status["status"] = json!("unhealthy");
        (StatusCode::SERVICE_UNAVAILABLE, Json(health_status))
    } else {
        (StatusCode::OK, Json(health_status))
    }
}
