//! Gateway error type and its JSON rendering.
use arc_security::{ContextError, ModelError};
use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use credential_store_sdk::StoreError;
use serde::Serialize;
use thiserror::Error;

use crate::domain::DomainError;

/// Challenge attached to every 401 response.
pub const BASIC_CHALLENGE: &str = r#"Basic realm="Authentication Required""#;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Rejected credentials or a failed authorization check.
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Plan tier does not include the requested feature.
    #[error("{0}")]
    PaymentRequired(String),

    /// Route served only by Elasticsearch-compatible backends. Rendered with an empty body.
    #[error("backend does not support this route")]
    BackendUnsupported,

    /// Request context lacks a value an earlier middleware should have set.
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: u16,
    status: &'a str,
    message: String,
}

impl GatewayError {
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) | Self::Store(StoreError::Conflict { .. }) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_)
            | Self::BackendUnsupported
            | Self::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Context(_) | Self::Domain(_) | Self::Store(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Log at a level matching the severity of the failure.
    pub fn log(&self) {
        match self.status() {
            s if s.is_server_error() => {
                tracing::error!(error = %self, status = s.as_u16(), "request failed");
            }
            StatusCode::UNAUTHORIZED => tracing::debug!(error = %self, "request rejected"),
            s => tracing::warn!(error = %self, status = s.as_u16(), "request rejected"),
        }
    }
}

impl From<ModelError> for GatewayError {
    fn from(err: ModelError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if matches!(self, Self::BackendUnsupported) {
            return status.into_response();
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: status.as_u16(),
                status: status.canonical_reason().unwrap_or("Error"),
                message: self.to_string(),
            },
        };
        let mut resp = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            resp.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(BASIC_CHALLENGE),
            );
        }
        resp
    }
}

/// `{code, status, message}` success body.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub code: u16,
    pub status: &'static str,
    pub message: String,
}

impl Ack {
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            status: "OK",
            message: message.into(),
        }
    }
}

impl IntoResponse for Ack {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
