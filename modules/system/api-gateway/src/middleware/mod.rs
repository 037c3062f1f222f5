//! Request pipeline.
//!
//! Each middleware reads and appends to the [`RequestContext`] stored in the
//! request extensions by [`crate::domain::identify_tenant`].
use arc_security::{ContextError, ContextKey, RequestContext};
use axum::extract::Request;
use axum::response::{IntoResponse, Response};

use crate::error::GatewayError;

pub mod auth;
pub mod classify;
pub mod recovery;
pub mod telemetry;
pub mod validators;

fn missing_context() -> GatewayError {
    GatewayError::Context(ContextError::Missing(ContextKey::Domain))
}

pub(crate) fn context(req: &Request) -> Result<&RequestContext, GatewayError> {
    req.extensions()
        .get::<RequestContext>()
        .ok_or_else(missing_context)
}

pub(crate) fn context_mut(req: &mut Request) -> Result<&mut RequestContext, GatewayError> {
    req.extensions_mut()
        .get_mut::<RequestContext>()
        .ok_or_else(missing_context)
}

/// Log a rejection and render it.
pub(crate) fn reject(err: GatewayError) -> Response {
    err.log();
    err.into_response()
}
