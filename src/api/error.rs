//! HTTP error mapping for analysis failures.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::analysis::PipelineError;

/// Retry hint sent with quota failures.
pub const QUOTA_RETRY_AFTER_SECS: u64 = 60;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Pipeline(err) => match err {
                PipelineError::NoModelsConfigured => StatusCode::SERVICE_UNAVAILABLE,
                PipelineError::FatalCredential { .. } => StatusCode::BAD_GATEWAY,
                PipelineError::FatalQuota { .. } => StatusCode::TOO_MANY_REQUESTS,
                PipelineError::FatalPermission { .. } => StatusCode::FORBIDDEN,
                PipelineError::FatalConfiguration { .. } => StatusCode::BAD_GATEWAY,
                PipelineError::AllModelsExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match &self {
            ApiError::Pipeline(err) => {
                // Provider detail stays in the logs; user_message decides what the client sees.
                tracing::warn!(code = err.code(), error = %err, "Analysis request failed");
                (err.code(), err.user_message())
            }
            ApiError::BadRequest(detail) => ("BAD_REQUEST", detail.clone()),
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::Pipeline(PipelineError::FatalQuota { .. }) = &self {
            response.headers_mut().insert(
                "Retry-After",
                HeaderValue::from(QUOTA_RETRY_AFTER_SECS),
            );
        }
        response
    }
}
