use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use sealgate_auth::{AuthError, AuthorityError, KeyError};
use sealgate_core::TransformError;

/// Everything that can end a transform request early.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("malformed body: {0}")]
    MalformedBody(String),

    #[error("x-namespace header is required")]
    MissingNamespace,

    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Authority(#[from] AuthorityError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Only produced under the `reject` deny policy.
    #[error("caller may not transform payloads in namespace '{namespace}'")]
    AccessDenied { namespace: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            PipelineError::MalformedBody(_)
            | PipelineError::MissingNamespace
            | PipelineError::InvalidNamespace(_) => StatusCode::BAD_REQUEST,
            PipelineError::Auth(e) if e.is_upstream() => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::Auth(_) => StatusCode::UNAUTHORIZED,
            PipelineError::Authority(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::Transform(_) | PipelineError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            PipelineError::AccessDenied { .. } => StatusCode::FORBIDDEN,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::UnsupportedMediaType(_) => "unsupported_media_type",
            PipelineError::MalformedBody(_) => "malformed_body",
            PipelineError::MissingNamespace => "missing_namespace",
            PipelineError::InvalidNamespace(_) => "invalid_namespace",
            PipelineError::Auth(AuthError::MalformedAuthHeader(_)) => "malformed_auth_header",
            PipelineError::Auth(AuthError::MalformedToken(_)) => "malformed_token",
            PipelineError::Auth(AuthError::KeyResolutionFailed(KeyError::KeySourceUnavailable(_))) => {
                "key_source_unavailable"
            }
            PipelineError::Auth(AuthError::KeyResolutionFailed(KeyError::KeyNotFound { .. })) => {
                "key_not_found"
            }
            PipelineError::Auth(AuthError::KeyResolutionFailed(_)) => "key_resolution_failed",
            PipelineError::Auth(AuthError::TokenVerificationFailed(_)) => "token_verification_failed",
            PipelineError::Authority(_) => "authority_unavailable",
            PipelineError::Transform(_) => "transform_failed",
            PipelineError::AccessDenied { .. } => "access_denied",
            PipelineError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed");
        } else {
            tracing::info!(error = %self, code = self.code(), "request rejected");
        }

        // Transform failures carry the codec's message unchanged.
        let message = match &self {
            PipelineError::Transform(e) => e.to_string(),
            other => other.to_string(),
        };
        json_error(status, self.code(), message)
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
