//! Job submission, status, listing and deletion endpoints.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/submit", post(submit))
        .route("/status/:job_id", get(get_status))
        .route("/jobs", get(list_jobs).delete(delete_all_jobs))
        .route("/jobs/:job_id", delete(delete_job))
}

pub async fn submit(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::SubmitRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let Some(text) = body.text else {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "Text is required");
    };

    match services.coordinator.submit(&text).await {
        Ok(submitted) => (StatusCode::OK, Json(dto::SubmitResponse::from(submitted))).into_response(),
        Err(e) => errors::coordinator_error_to_response(e),
    }
}

pub async fn get_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    match services.coordinator.get_status(&job_id).await {
        Ok(job) => (StatusCode::OK, Json(dto::JobStatusResponse::from(job))).into_response(),
        Err(e) => errors::coordinator_error_to_response(e),
    }
}

pub async fn list_jobs(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.coordinator.list_jobs().await {
        Ok(jobs) => {
            let jobs = jobs.into_iter().map(dto::JobSummaryResponse::from).collect();
            (StatusCode::OK, Json(dto::JobListResponse { jobs })).into_response()
        }
        Err(e) => errors::coordinator_error_to_response(e),
    }
}

pub async fn delete_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    match services.coordinator.delete_job(&job_id).await {
        Ok(job_id) => (
            StatusCode::OK,
            Json(dto::DeleteJobResponse {
                message: "Job deleted successfully",
                job_id,
            }),
        )
            .into_response(),
        Err(e) => errors::coordinator_error_to_response(e),
    }
}

pub async fn delete_all_jobs(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.coordinator.delete_all_jobs().await {
        Ok(deleted_count) => (
            StatusCode::OK,
            Json(dto::DeleteAllResponse {
                message: "All jobs deleted successfully",
                deleted_count,
            }),
        )
            .into_response(),
        Err(e) => errors::coordinator_error_to_response(e),
    }
}
