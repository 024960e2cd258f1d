//! Error types for the server.
//!
//! Every error renders as a plain-text body holding a single message.
//! Script messages are sanitized before they get here.

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use sandpit_dataset::PipelineError;
use sandpit_script::{GuardError, StagingError};
use thiserror::Error;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Bad request (e.g. malformed config/secrets lists).
    #[error("{0}")]
    BadRequest(String),

    /// The script failed. Message is sanitized.
    #[error("{0}")]
    Script(String),

    /// The script could not be staged.
    #[error("{0}")]
    Staging(#[from] StagingError),

    /// The transform pipeline failed. Message is sanitized.
    #[error("{0}")]
    Transform(String),

    /// Request body too large.
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Rate limit exceeded.
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<PipelineError> for ServerError {
    fn from(e: PipelineError) -> Self {
        if e.is_client_error() {
            ServerError::BadRequest(e.to_string())
        } else {
            ServerError::Transform(e.to_string())
        }
    }
}

impl From<GuardError> for ServerError {
    fn from(e: GuardError) -> Self {
        ServerError::Internal(e.to_string())
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

impl ServerError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) | ServerError::Script(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ServerError::Staging(_)
            | ServerError::Transform(_)
            | ServerError::Config(_)
            | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, error = %message, "Client error");
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            message,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandpit_dataset::ParamError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServerError::Script("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::Transform("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServerError::PayloadTooLarge { limit: 1 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ServerError::RateLimitExceeded.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_pipeline_param_error_is_bad_request() {
        let err: ServerError = PipelineError::from(ParamError::OddLength {
            field: "config".into(),
            count: 1,
        })
        .into();
        assert!(matches!(err, ServerError::BadRequest(_)));
    }

    #[test]
    fn test_pipeline_create_error_is_internal() {
        let err: ServerError = PipelineError::Create {
            message: "line:1:1: boom".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "line:1:1: boom");
    }

    #[tokio::test]
    async fn test_body_is_plain_message() {
        let response = ServerError::Script("line:3:9: bad".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"line:3:9: bad");
    }
}
