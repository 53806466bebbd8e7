use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use textgate_infra::CoordinatorError;

pub fn coordinator_error_to_response(err: CoordinatorError) -> axum::response::Response {
    match err {
        CoordinatorError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        CoordinatorError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", "Job not found"),
        CoordinatorError::Store(e) => {
            // Details stay in the logs.
            tracing::error!(error = %e, "job store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "Internal server error")
        }
    }
}

pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(
        StatusCode::BAD_REQUEST,
        "invalid_body",
        format!("Invalid JSON body: {}", rejection.body_text()),
    )
}

/// Every failure carries a human-readable `error` plus a stable `code`.
pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": message.into(),
            "code": code,
        })),
    )
        .into_response()
}
