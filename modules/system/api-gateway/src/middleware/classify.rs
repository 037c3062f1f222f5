//! Classification middlewares: category and ACL, request log, operation,
//! target indices and the reactivesearch query body.
use std::sync::Arc;

use arc_security::{Category, RsQuery, TenantDomain};
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use serde::Deserialize;

use super::{context, context_mut, reject};
use crate::classify::{Classified, RouteTable, split_indices};
use crate::error::GatewayError;

/// Header carrying a client-chosen query identifier.
pub const QUERY_ID_HEADER: &str = "x-search-id";

fn classified(req: &Request) -> Result<&Classified, GatewayError> {
    req.extensions()
        .get::<Classified>()
        .ok_or_else(|| GatewayError::internal("request was not classified"))
}

fn classify(table: &RouteTable, req: &mut Request) -> Result<(), GatewayError> {
    let classified = table.classify(req.method(), req.uri().path());
    let query_id = req
        .headers()
        .get(QUERY_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned);

    let ctx = context_mut(req)?;
    ctx.set_category(classified.class.category)?;
    ctx.set_acl(classified.class.acl)?;
    if let Some(id) = query_id {
        ctx.set_query_id(id)?;
    }
    ctx.record_middleware("classify");
    req.extensions_mut().insert(classified);
    Ok(())
}

/// Resolve category and ACL from the route table.
pub async fn classify_request(
    State(table): State<Arc<RouteTable>>,
    mut req: Request,
    next: Next,
) -> Response {
    match classify(&table, &mut req) {
        Ok(()) => next.run(req).await,
        Err(err) => reject(err),
    }
}

/// Log the classified request.
pub async fn log_request(mut req: Request, next: Next) -> Response {
    if let Ok(ctx) = context(&req) {
        tracing::debug!(
            method = %req.method(),
            path = %req.uri().path(),
            tenant = ctx.domain().map(TenantDomain::raw).unwrap_or_default(),
            category = ?ctx.category().ok(),
            acl = ?ctx.acl().ok(),
            "classified request"
        );
    }
    match context_mut(&mut req) {
        Ok(ctx) => ctx.record_middleware("log"),
        Err(err) => return reject(err),
    }
    next.run(req).await
}

fn classify_op_inner(req: &mut Request) -> Result<(), GatewayError> {
    let op = classified(req)?.class.op_for(req.method());
    let ctx = context_mut(req)?;
    ctx.set_op(op)?;
    ctx.record_middleware("op");
    Ok(())
}

/// Resolve the operation: the route's own op, else from the method.
pub async fn classify_op(mut req: Request, next: Next) -> Response {
    match classify_op_inner(&mut req) {
        Ok(()) => next.run(req).await,
        Err(err) => reject(err),
    }
}

fn classify_indices_inner(req: &mut Request) -> Result<(), GatewayError> {
    let classified = classified(req)?;
    let indices = classified
        .index
        .as_deref()
        .map(split_indices)
        .unwrap_or_default();
    let pipelines = classified
        .pipeline
        .as_deref()
        .map(split_indices)
        .unwrap_or_default();
    let ctx = context_mut(req)?;
    ctx.set_indices(indices)?;
    ctx.set_pipelines(pipelines)?;
    ctx.record_middleware("indices");
    Ok(())
}

/// Resolve the target indices and ingest pipelines from the path segments.
pub async fn classify_indices(mut req: Request, next: Next) -> Response {
    match classify_indices_inner(&mut req) {
        Ok(()) => next.run(req).await,
        Err(err) => reject(err),
    }
}

#[derive(Deserialize)]
struct RsBody {
    #[serde(default)]
    query: Vec<RsQuery>,
}

/// Buffer reactivesearch request bodies and record their queries.
///
/// The body is put back unchanged for the handler. Bodies that are not a
/// valid reactivesearch request are passed on without recorded queries.
pub async fn capture_rs_query(
    State(limit): State<usize>,
    req: Request,
    next: Next,
) -> Response {
    let is_rs = context(&req)
        .and_then(|ctx| ctx.category().map_err(GatewayError::from))
        .is_ok_and(|c| c == Category::ReactiveSearch);
    if !is_rs || matches!(*req.method(), Method::GET | Method::HEAD) {
        return next.run(req).await;
    }

    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return reject(GatewayError::bad_request(format!(
                "failed to read request body: {err}"
            )));
        }
    };
    let mut req = Request::from_parts(parts, Body::from(bytes.clone()));

    let queries = serde_json::from_slice::<RsBody>(&bytes)
        .map(|b| b.query)
        .unwrap_or_default();
    let result = context_mut(&mut req).and_then(|ctx| {
        ctx.set_request_body(bytes)?;
        ctx.set_rs_query(queries)?;
        ctx.record_middleware("rs_query");
        Ok(())
    });
    match result {
        Ok(()) => next.run(req).await,
        Err(err) => reject(err),
    }
}
