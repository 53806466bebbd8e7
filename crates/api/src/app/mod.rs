//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store/analyzer wiring behind the coordinator
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};

use textgate_infra::GatewayConfig;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{build_services, AppServices};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &GatewayConfig) -> anyhow::Result<Router> {
    let services = build_services(config).await?;
    Ok(router(Arc::new(services)))
}

/// Router over already-built services.
pub fn router(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", routes::router())
        .fallback(routes::system::not_found)
        .method_not_allowed_fallback(routes::system::method_not_allowed)
        .layer(Extension(services))
}
