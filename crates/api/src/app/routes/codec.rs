//! `/encode` and `/decode`.
//!
//! Per request: check framing, parse the batch, resolve the namespace, pass
//! the gate, transform (or not), serialise.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::Instrument;

use sealgate_core::{Direction, Namespace, PayloadBatch};

use crate::app::errors::PipelineError;
use crate::app::services::AppServices;
use crate::authz::Admission;
use crate::context::{NAMESPACE_HEADER, RequestId};

const JSON: &str = "application/json";

pub async fn encode(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    transform(Direction::Encode, services, request_id, headers, body).await
}

pub async fn decode(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    transform(Direction::Decode, services, request_id, headers, body).await
}

/// CORS preflight; the headers themselves come from the CORS layer.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn transform(
    direction: Direction,
    services: Arc<AppServices>,
    request_id: RequestId,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let span = tracing::info_span!(
        "transform",
        request_id = %request_id,
        %direction,
        namespace = tracing::field::Empty,
    );

    match run(direction, &services, &headers, &body).instrument(span).await {
        Ok(batch) => ([(header::CONTENT_TYPE, JSON)], batch).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn run(
    direction: Direction,
    services: &AppServices,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Vec<u8>, PipelineError> {
    require_json(headers)?;
    let batch =
        PayloadBatch::from_json(body).map_err(|e| PipelineError::MalformedBody(e.to_string()))?;

    let namespace = namespace(headers, services)?;
    tracing::Span::current().record("namespace", namespace.as_str());

    let admission = match &services.gatekeeper {
        Some(gate) => {
            let authorization = headers
                .get(header::AUTHORIZATION)
                .map(|v| v.to_str().unwrap_or_default());
            gate.admit(authorization, &namespace).await?
        }
        None => Admission::Transform,
    };

    let out = match admission {
        Admission::Transform => services.dispatcher.apply(direction, &namespace, &batch).await?,
        Admission::PassThrough => batch,
    };
    tracing::info!(payloads = out.len(), ?admission, "batch processed");

    out.to_json().map_err(|e| PipelineError::Internal(e.to_string()))
}

fn require_json(headers: &HeaderMap) -> Result<(), PipelineError> {
    let raw = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let essence = raw.split(';').next().unwrap_or_default().trim();
    if essence.eq_ignore_ascii_case(JSON) {
        Ok(())
    } else if essence.is_empty() {
        Err(PipelineError::UnsupportedMediaType("missing content type".into()))
    } else {
        Err(PipelineError::UnsupportedMediaType(essence.to_string()))
    }
}

/// Header namespace; falls back to the default only when no gate is configured.
fn namespace(headers: &HeaderMap, services: &AppServices) -> Result<Namespace, PipelineError> {
    let raw = headers
        .get(NAMESPACE_HEADER)
        .map(|v| {
            v.to_str()
                .map_err(|_| PipelineError::InvalidNamespace("not valid text".into()))
        })
        .transpose()?
        .map(str::trim)
        .filter(|ns| !ns.is_empty());

    match raw {
        Some(ns) => Namespace::parse(ns).map_err(|e| PipelineError::InvalidNamespace(e.to_string())),
        None if services.gatekeeper.is_none() => Ok(services.default_namespace.clone()),
        None => Err(PipelineError::MissingNamespace),
    }
}
