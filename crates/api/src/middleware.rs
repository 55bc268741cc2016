//! Cross-cutting layers: request correlation and CORS.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use crate::config::GatewayConfig;
use crate::context::{REQUEST_ID_HEADER, RequestId};

const BASE_ALLOWED_HEADERS: &str = "content-type,x-namespace";
const SECURE_ALLOWED_HEADERS: &str = "content-type,x-namespace,authorization";

/// Assigns a [`RequestId`], runs the request inside a span carrying it, and
/// echoes it on the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = RequestId::from_headers(req.headers());
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Per-origin CORS headers for the transform endpoints.
///
/// Origins match exactly; an unknown origin gets no `Access-Control-Allow-Origin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    allowed_origins: HashSet<String>,
    secure: bool,
}

impl CorsPolicy {
    pub fn new(allowed_origins: impl IntoIterator<Item = impl Into<String>>, secure: bool) -> Self {
        Self {
            allowed_origins: allowed_origins.into_iter().map(Into::into).collect(),
            secure,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.allowed_origins.iter().cloned(), config.is_secure())
    }

    pub fn headers_for(&self, origin: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(origin) = origin.filter(|o| self.allowed_origins.contains(*o)) {
            if let Ok(value) = HeaderValue::from_str(origin) {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
                headers.insert(header::VARY, HeaderValue::from_static("origin"));
            }
        }

        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("POST"));
        if self.secure {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(SECURE_ALLOWED_HEADERS),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        } else {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(BASE_ALLOWED_HEADERS),
            );
        }

        headers
    }
}

/// Attaches [`CorsPolicy`] headers to every response, errors included.
pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    req: Request,
    next: Next,
) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .extend(policy.headers_for(origin.as_deref()));
    response
}
