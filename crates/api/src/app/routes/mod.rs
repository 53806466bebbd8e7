use axum::Router;

pub mod jobs;
pub mod system;

/// Router for everything under `/api`.
pub fn router() -> Router {
    jobs::router()
}
