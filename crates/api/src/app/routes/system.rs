use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, Json};

use crate::app::{dto::HealthResponse, errors};
use crate::app::services::AppServices;

pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: services.service_name.clone(),
    })
}

pub async fn not_found() -> axum::response::Response {
    errors::json_error(StatusCode::NOT_FOUND, "route_not_found", "Not found")
}

pub async fn method_not_allowed() -> axum::response::Response {
    errors::json_error(
        StatusCode::METHOD_NOT_ALLOWED,
        "method_not_allowed",
        "Method not allowed",
    )
}
