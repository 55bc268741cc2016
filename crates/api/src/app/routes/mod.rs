use axum::{Router, routing::post};

pub mod codec;
pub mod system;

/// Transform endpoints. Preflight is answered on both paths.
pub fn router() -> Router {
    Router::new()
        .route("/encode", post(codec::encode).options(codec::preflight))
        .route("/decode", post(codec::decode).options(codec::preflight))
}
