//! Post-authentication guards.
//!
//! Each guard is a pure check over the [`RequestContext`]; the middleware
//! wrappers only gather request inputs (client IP, `Referer`, the matched
//! route) and short-circuit with the check's error.
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use arc_security::{CidrBlock, Credential, RefererPattern, RequestContext};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};

use super::auth::is_root_request;
use super::{context, context_mut, reject};
use crate::classify::Classified;
use crate::config::{Backend, GatewayConfig, Plan};
use crate::error::GatewayError;

/// Configuration the guards depend on.
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    /// Index readable by every credential holding the `suggestions` category.
    pub suggestions_index: String,
    pub plan: Option<Plan>,
    pub backend: Backend,
    pub sls_mode: bool,
}

impl ValidationPolicy {
    #[must_use]
    pub fn from_config(cfg: &GatewayConfig) -> Self {
        Self {
            suggestions_index: cfg.suggestions_meta_es_index.clone(),
            plan: cfg.plan,
            backend: cfg.backend,
            sls_mode: cfg.sls_mode,
        }
    }
}

fn denied(credential: &Credential, what: &str) -> GatewayError {
    GatewayError::unauthorized(format!(
        "{} with username={} {what}",
        credential.tag(),
        credential.username()
    ))
}

/// Permission sources must contain the client IP.
///
/// # Errors
/// 401 when no source admits `ip`.
pub fn check_sources(ctx: &RequestContext, ip: Option<IpAddr>) -> Result<(), GatewayError> {
    let Some(permission) = ctx.credential()?.as_permission() else {
        return Ok(());
    };
    if permission.sources.iter().any(CidrBlock::is_any) {
        return Ok(());
    }
    let Some(ip) = ip else {
        return Err(GatewayError::unauthorized(format!(
            "unable to determine client ip; permission with username={} is restricted to sources {}",
            permission.username,
            permission.sources_display()
        )));
    };
    if permission.sources.iter().any(|s| s.contains(ip)) {
        return Ok(());
    }
    Err(GatewayError::unauthorized(format!(
        "permission with username={} doesn't have access from ip {ip}; permitted sources are {}",
        permission.username,
        permission.sources_display()
    )))
}

/// Permission referer patterns must match the `Referer` header.
///
/// # Errors
/// 401 when no pattern matches.
pub fn check_referers(ctx: &RequestContext, referer: Option<&str>) -> Result<(), GatewayError> {
    let Some(permission) = ctx.credential()?.as_permission() else {
        return Ok(());
    };
    if permission.referers.iter().any(RefererPattern::is_wildcard) {
        return Ok(());
    }
    let referer = referer.unwrap_or_default();
    if permission.referers.iter().any(|p| p.matches(referer)) {
        return Ok(());
    }
    Err(GatewayError::unauthorized(format!(
        "permission with username={} doesn't have access from referer \"{referer}\"",
        permission.username
    )))
}

/// # Errors
/// 401 when the permission's TTL has elapsed at `now`.
pub fn check_expiry(ctx: &RequestContext, now: DateTime<Utc>) -> Result<(), GatewayError> {
    match ctx.credential()?.as_permission() {
        Some(permission) if permission.is_expired_at(now) => Err(GatewayError::unauthorized(
            format!("permission with username={} is expired", permission.username),
        )),
        _ => Ok(()),
    }
}

/// # Errors
/// 401 when a permission lacks the request operation.
pub fn check_op(ctx: &RequestContext) -> Result<(), GatewayError> {
    let op = ctx.op()?;
    let credential = ctx.credential()?;
    if credential.can_do(op) {
        return Ok(());
    }
    Err(denied(credential, &format!("does not have '{op}' op")))
}

/// # Errors
/// 401 when the credential lacks the request category.
pub fn check_category(ctx: &RequestContext) -> Result<(), GatewayError> {
    let category = ctx.category()?;
    let credential = ctx.credential()?;
    if credential.is_admin() || credential.has_category(category) {
        return Ok(());
    }
    Err(denied(credential, &format!("does not have '{category}' category")))
}

/// # Errors
/// 401 when the credential lacks the request ACL.
pub fn check_acl(ctx: &RequestContext) -> Result<(), GatewayError> {
    let acl = ctx.acl()?;
    let credential = ctx.credential()?;
    if credential.is_admin() || credential.has_acl(acl) {
        return Ok(());
    }
    Err(denied(credential, &format!("does not have '{acl}' acl")))
}

/// Index patterns must admit every target index; no target means cluster access.
///
/// Only routes addressing indices (Elasticsearch and reactivesearch) are checked.
///
/// # Errors
/// 401 naming the first index the credential cannot access.
pub fn check_indices(ctx: &RequestContext, suggestions_index: &str) -> Result<(), GatewayError> {
    let category = ctx.category()?;
    if !(category.is_from_es() || category.is_from_rs()) {
        return Ok(());
    }
    let credential = ctx.credential()?;
    let indices = ctx.indices()?;
    if indices.is_empty() {
        if credential.can_access_cluster() {
            return Ok(());
        }
        return Err(denied(credential, "doesn't have cluster level access"));
    }

    let suggestions = credential.has_category(arc_security::Category::Suggestions);
    match indices.iter().find(|index| {
        !(credential.can_access_index(index) || (suggestions && *index == suggestions_index))
    }) {
        Some(index) => Err(denied(credential, &format!("doesn't have access to index '{index}'"))),
        None => Ok(()),
    }
}

/// Pipeline patterns must admit every target pipeline.
///
/// # Errors
/// 401 naming the first pipeline the credential cannot access.
pub fn check_pipelines(ctx: &RequestContext) -> Result<(), GatewayError> {
    let pipelines = ctx.pipelines()?;
    if pipelines.is_empty() {
        return Ok(());
    }
    let credential = ctx.credential()?;
    match pipelines
        .iter()
        .find(|pipeline| !credential.can_access_pipeline(pipeline))
    {
        Some(pipeline) => Err(denied(
            credential,
            &format!("doesn't have access to pipeline '{pipeline}'"),
        )),
        None => Ok(()),
    }
}

/// # Errors
/// 402 when `required` is non-empty and excludes the current plan.
pub fn check_plan(required: &[Plan], current: Option<Plan>) -> Result<(), GatewayError> {
    let Some(plan) = current else {
        return Ok(());
    };
    if required.is_empty() || required.contains(&plan) {
        return Ok(());
    }
    Err(GatewayError::PaymentRequired(format!(
        "This feature is not available for the {plan} plan. Please upgrade your plan to access it."
    )))
}

/// # Errors
/// [`GatewayError::BackendUnsupported`] for Elasticsearch routes in SLS mode
/// on a backend that is not Elasticsearch-compatible.
pub fn check_backend(ctx: &RequestContext, policy: &ValidationPolicy) -> Result<(), GatewayError> {
    let category = ctx.category()?;
    if policy.sls_mode && category.is_from_es() && !policy.backend.is_es_compatible() {
        return Err(GatewayError::BackendUnsupported);
    }
    Ok(())
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .find(|ip| !is_private(*ip))
}

/// `X-Real-Ip`, then the first public `X-Forwarded-For` hop, then the peer address.
#[must_use]
pub fn client_ip(req: &Request) -> Option<IpAddr> {
    header_ip(req.headers(), "x-real-ip")
        .or_else(|| forwarded_ip(req.headers()))
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
}

async fn guard<F>(mut req: Request, next: Next, name: &'static str, check: F) -> Response
where
    F: FnOnce(&Request, &RequestContext) -> Result<(), GatewayError>,
{
    let result = context(&req).and_then(|ctx| check(&req, ctx));
    if let Err(err) = result {
        return reject(err);
    }
    match context_mut(&mut req) {
        Ok(ctx) => ctx.record_middleware(name),
        Err(err) => return reject(err),
    }
    next.run(req).await
}

pub async fn validate_sources(req: Request, next: Next) -> Response {
    guard(req, next, "sources", |req, ctx| check_sources(ctx, client_ip(req))).await
}

pub async fn validate_referers(req: Request, next: Next) -> Response {
    guard(req, next, "referers", |req, ctx| {
        let referer = req
            .headers()
            .get(header::REFERER)
            .and_then(|v| v.to_str().ok());
        check_referers(ctx, referer)
    })
    .await
}

pub async fn validate_expiry(req: Request, next: Next) -> Response {
    guard(req, next, "expiry", |_, ctx| check_expiry(ctx, Utc::now())).await
}

pub async fn validate_op(req: Request, next: Next) -> Response {
    guard(req, next, "op", |_, ctx| check_op(ctx)).await
}

pub async fn validate_category(req: Request, next: Next) -> Response {
    guard(req, next, "category", |req, ctx| {
        if is_root_request(req) {
            return Ok(());
        }
        check_category(ctx)
    })
    .await
}

pub async fn validate_acl(req: Request, next: Next) -> Response {
    guard(req, next, "acl", |req, ctx| {
        if is_root_request(req) {
            return Ok(());
        }
        check_acl(ctx)
    })
    .await
}

pub async fn validate_indices(
    State(policy): State<Arc<ValidationPolicy>>,
    req: Request,
    next: Next,
) -> Response {
    guard(req, next, "indices", |req, ctx| {
        if is_root_request(req) {
            return Ok(());
        }
        check_indices(ctx, &policy.suggestions_index)?;
        check_pipelines(ctx)
    })
    .await
}

pub async fn validate_plan(
    State(policy): State<Arc<ValidationPolicy>>,
    req: Request,
    next: Next,
) -> Response {
    guard(req, next, "plan", |req, _| {
        let required = req
            .extensions()
            .get::<Classified>()
            .map(|c| c.class.plans)
            .unwrap_or_default();
        check_plan(required, policy.plan)
    })
    .await
}

pub async fn validate_backend(
    State(policy): State<Arc<ValidationPolicy>>,
    req: Request,
    next: Next,
) -> Response {
    guard(req, next, "backend", |req, ctx| {
        if is_root_request(req) {
            return Ok(());
        }
        check_backend(ctx, &policy)
    })
    .await
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::time::Instant;

    use arc_security::{Acl, Category, IndexPattern, Op, Permission, TenantDomain, User};
    use axum::http::StatusCode;
    use chrono::TimeZone;

    fn ctx_with(credential: impl Into<Credential>) -> RequestContext {
        let mut ctx = RequestContext::new(Instant::now());
        ctx.set_domain(TenantDomain::new("t", None)).unwrap();
        ctx.set_credential(credential.into()).unwrap();
        ctx
    }

    fn permission() -> Permission {
        Permission::new("key", "secret", "admin")
    }

    #[test]
    fn any_source_admits_every_ip() {
        let ctx = ctx_with(permission());
        assert!(check_sources(&ctx, Some("::1".parse().unwrap())).is_ok());
        assert!(check_sources(&ctx, None).is_ok());
    }

    #[test]
    fn cidr_mismatch_names_the_sources() {
        let mut p = permission();
        p.sources = vec!["10.10.10.0/24".parse().unwrap()];
        let ctx = ctx_with(p);
        assert!(check_sources(&ctx, Some("10.10.10.7".parse().unwrap())).is_ok());
        let err = check_sources(&ctx, Some("::1".parse().unwrap())).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert!(err.to_string().contains("[10.10.10.0/24]"));
    }

    #[test]
    fn users_skip_permission_only_checks() {
        let ctx = ctx_with(User::new("u", "hash"));
        assert!(check_sources(&ctx, None).is_ok());
        assert!(check_referers(&ctx, None).is_ok());
        assert!(check_expiry(&ctx, Utc::now()).is_ok());
    }

    #[test]
    fn referers_match_patterns() {
        let mut p = permission();
        p.referers = vec![RefererPattern::new("https://*.example.com").unwrap()];
        let ctx = ctx_with(p);
        assert!(check_referers(&ctx, Some("https://app.example.com/page")).is_ok());
        assert!(check_referers(&ctx, Some("https://evil.test")).is_err());
        assert!(check_referers(&ctx, None).is_err());

        let ctx = ctx_with(permission());
        assert!(check_referers(&ctx, None).is_ok());
    }

    #[test]
    fn expired_permission_is_rejected() {
        let mut p = permission();
        p.created_at = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        p.ttl = 3;
        let ctx = ctx_with(p);
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let err = check_expiry(&ctx, now).unwrap_err();
        assert_eq!(err.to_string(), "permission with username=key is expired");
    }

    #[test]
    fn op_gates_permissions_only() {
        let mut ctx = ctx_with(permission());
        ctx.set_op(Op::Write).unwrap();
        let err = check_op(&ctx).unwrap_err();
        assert!(err.to_string().contains("'write'"));

        let mut ctx = ctx_with(User::new("u", "hash"));
        ctx.set_op(Op::Delete).unwrap();
        assert!(check_op(&ctx).is_ok());
    }

    #[test]
    fn acl_and_category_checks() {
        let mut ctx = ctx_with(permission());
        ctx.set_category(Category::Search).unwrap();
        ctx.set_acl(Acl::Msearch).unwrap();
        assert!(check_category(&ctx).is_ok());
        assert!(check_acl(&ctx).is_ok());

        let mut p = permission();
        p.acls = vec![Acl::SearchQuery];
        let mut ctx = ctx_with(p);
        ctx.set_category(Category::Search).unwrap();
        ctx.set_acl(Acl::Msearch).unwrap();
        let err = check_acl(&ctx).unwrap_err();
        assert!(err.to_string().contains("'msearch'"));
    }

    #[test]
    fn index_patterns_cover_every_target() {
        let mut p = permission();
        p.indices = vec![IndexPattern::new("logs-*").unwrap()];
        let mut ctx = ctx_with(p);
        ctx.set_category(Category::Search).unwrap();
        ctx.set_indices(vec!["logs-1".to_owned(), "logs-2".to_owned()])
            .unwrap();
        assert!(check_indices(&ctx, ".suggestions").is_ok());

        let mut p = permission();
        p.indices = vec![IndexPattern::new("logs-*").unwrap()];
        let mut ctx = ctx_with(p);
        ctx.set_category(Category::Search).unwrap();
        ctx.set_indices(vec!["logs-1".to_owned(), "users".to_owned()])
            .unwrap();
        let err = check_indices(&ctx, ".suggestions").unwrap_err();
        assert!(err.to_string().contains("'users'"));
    }

    #[test]
    fn empty_targets_require_cluster_access() {
        let mut p = permission();
        p.indices = vec![IndexPattern::new("logs-*").unwrap()];
        let mut ctx = ctx_with(p);
        ctx.set_category(Category::Cat).unwrap();
        ctx.set_indices(Vec::new()).unwrap();
        assert!(check_indices(&ctx, ".suggestions").is_err());

        let mut ctx = ctx_with(permission());
        ctx.set_category(Category::Cat).unwrap();
        ctx.set_indices(Vec::new()).unwrap();
        assert!(check_indices(&ctx, ".suggestions").is_ok());
    }

    #[test]
    fn suggestions_category_reaches_meta_index() {
        let mut p = permission();
        p.categories = vec![Category::Search, Category::Suggestions];
        p.indices = vec![IndexPattern::new("movies").unwrap()];
        let mut ctx = ctx_with(p);
        ctx.set_category(Category::Search).unwrap();
        ctx.set_indices(vec![".suggestions".to_owned()]).unwrap();
        assert!(check_indices(&ctx, ".suggestions").is_ok());
    }

    #[test]
    fn pipeline_patterns_cover_every_target() {
        let mut p = permission();
        p.pipelines = vec![IndexPattern::new("allowed-*").unwrap()];
        let mut ctx = ctx_with(p.clone());
        ctx.set_pipelines(vec!["allowed-1".to_owned()]).unwrap();
        assert!(check_pipelines(&ctx).is_ok());

        let mut ctx = ctx_with(p);
        ctx.set_pipelines(vec!["allowed-1".to_owned(), "secret".to_owned()])
            .unwrap();
        let err = check_pipelines(&ctx).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            err.to_string(),
            "permission with username=key doesn't have access to pipeline 'secret'"
        );

        let mut ctx = ctx_with(User::new("u", "hash"));
        ctx.set_pipelines(vec!["secret".to_owned()]).unwrap();
        assert!(check_pipelines(&ctx).is_ok());
    }

    #[test]
    fn plan_gate() {
        assert!(check_plan(&[], Some(Plan::Free)).is_ok());
        assert!(check_plan(&[Plan::ArcEnterprise], None).is_ok());
        assert!(check_plan(&[Plan::ArcEnterprise], Some(Plan::ArcEnterprise)).is_ok());
        let err = check_plan(&[Plan::ArcEnterprise], Some(Plan::ArcBasic)).unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYMENT_REQUIRED);
        assert!(err.to_string().contains("arc-basic"));
    }

    #[test]
    fn sls_mode_requires_es_backend() {
        let mut ctx = ctx_with(permission());
        ctx.set_category(Category::Search).unwrap();
        let mut policy = ValidationPolicy {
            suggestions_index: ".suggestions".to_owned(),
            plan: None,
            backend: Backend::Solr,
            sls_mode: true,
        };
        assert!(matches!(
            check_backend(&ctx, &policy),
            Err(GatewayError::BackendUnsupported)
        ));
        policy.backend = Backend::OpenSearch;
        assert!(check_backend(&ctx, &policy).is_ok());
        policy.backend = Backend::Solr;
        policy.sls_mode = false;
        assert!(check_backend(&ctx, &policy).is_ok());
    }

    #[test]
    fn client_ip_prefers_real_ip_then_public_forwarded_hop() {
        let req = Request::builder()
            .header("x-forwarded-for", "10.0.0.1, 203.0.113.9, 198.51.100.2")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), Some("203.0.113.9".parse().unwrap()));

        let req = Request::builder()
            .header("x-real-ip", "::1")
            .header("x-forwarded-for", "203.0.113.9")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), Some("::1".parse().unwrap()));

        let mut req = Request::builder()
            .body(axum::body::Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 4], 5000))));
        assert_eq!(client_ip(&req), Some("192.0.2.4".parse().unwrap()));
    }
}
