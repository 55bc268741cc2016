//! HTTP application wiring (axum router + services).
//!
//! - `services.rs`: adapters, verifier, authorizer, codec
//! - `routes/`: handlers
//! - `errors.rs`: error to response mapping

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::config::GatewayConfig;
use crate::middleware::{self, CorsPolicy};

pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (used by `main.rs` and the black-box tests).
pub fn build_app(config: &GatewayConfig, services: services::AppServices) -> Router {
    let cors = Arc::new(CorsPolicy::from_config(config));

    let transform = routes::router()
        .layer(Extension(Arc::new(services)))
        .layer(axum::middleware::from_fn_with_state(
            cors,
            middleware::cors_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(transform)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        )))
}
