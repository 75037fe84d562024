use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::Serialize;
use tracemirror_core::domain::{ServiceFilter, ServiceRecord};

use crate::{
    AppState,
    infra::errors::{AppError, AppResult},
};

#[derive(Debug, Serialize)]
pub struct ServiceListResponse {
    pub count: usize,
    pub services: Vec<ServiceRecord>,
}

/// `GET /api/v1/services[?active=true|false]`
pub async fn list_services_handler(
    State(state): State<AppState>,
    filter: Result<Query<ServiceFilter>, QueryRejection>,
) -> AppResult<Json<ServiceListResponse>> {
    let Query(filter) =
        filter.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    let registry = state
        .registry()
        .ok_or_else(|| AppError::unavailable("Registry is not configured"))?;

    let services = registry.list_services(filter).await?;

    Ok(Json(ServiceListResponse {
        count: services.len(),
        services,
    }))
}
