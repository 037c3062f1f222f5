//! Gateway composition root.
//!
//! Builds every shared component once and wires them into the axum router.
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::http::{HeaderValue, header};
use axum::middleware::{from_fn, from_fn_with_state};
use credential_store_sdk::CredentialStore;
use tokio_util::sync::CancellationToken;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::cache::{CacheInvalidator, CredentialCache, LocalInvalidator, PasswordCache};
use crate::classify::RouteTable;
use crate::config::{DEFAULT_TENANT, GatewayConfig};
use crate::control_plane::{ControlPlane, HttpControlPlane};
use crate::domain::{TenantIdentifier, identify_tenant};
use crate::handlers::{self, AdminState};
use crate::middleware::auth::{self, AuthState};
use crate::middleware::telemetry::{self, TelemetryIdentity};
use crate::middleware::validators::{self, ValidationPolicy};
use crate::middleware::{classify, recovery};
use crate::proxy::{self, EsProxy};
use crate::public_keys::PublicKeyRegistry;
use crate::sync::{PermissionSync, PublicKeySync, SyncEngine, SyncScript, UserSync};

const JSON_UTF8: &str = "application/json; charset=utf-8";

/// The gateway: caches, registry, middleware state and admin handlers for one process.
pub struct Gateway {
    config: GatewayConfig,
    store: Arc<dyn CredentialStore>,
    control_plane: Option<Arc<dyn ControlPlane>>,
    credentials: Arc<CredentialCache>,
    passwords: Arc<PasswordCache>,
    keys: Arc<PublicKeyRegistry>,
    invalidator: Arc<dyn CacheInvalidator>,
    identifier: Arc<TenantIdentifier>,
    routes: Arc<RouteTable>,
    policy: Arc<ValidationPolicy>,
    telemetry: Arc<TelemetryIdentity>,
    bcrypt_cost: u32,
}

impl Gateway {
    /// Build the gateway over `store`. A control plane is attached when
    /// `control_plane_url` is configured.
    ///
    /// # Errors
    /// Fails on an invalid encryption key, route table or control plane URL.
    pub fn new(config: GatewayConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let identifier = TenantIdentifier::from_config(&config)
            .context("invalid domain_name_encryption_key")?;
        let routes = RouteTable::builtin().context("failed to build route table")?;
        let control_plane = match config.control_plane_url.as_deref() {
            Some(url) => {
                let cp = HttpControlPlane::new(url, config.store_request_timeout())
                    .context("invalid control_plane_url")?;
                Some(Arc::new(cp) as Arc<dyn ControlPlane>)
            }
            None => None,
        };

        let credentials = Arc::new(CredentialCache::new());
        let passwords = Arc::new(PasswordCache::new());
        let invalidator = Arc::new(LocalInvalidator::new(
            credentials.clone(),
            passwords.clone(),
        ));

        Ok(Self {
            policy: Arc::new(ValidationPolicy::from_config(&config)),
            telemetry: Arc::new(TelemetryIdentity::from_config(&config)),
            identifier: Arc::new(identifier),
            routes: Arc::new(routes),
            keys: Arc::new(PublicKeyRegistry::new()),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            config,
            store,
            control_plane,
            credentials,
            passwords,
            invalidator,
        })
    }

    #[must_use]
    pub fn with_control_plane(mut self, control_plane: Arc<dyn ControlPlane>) -> Self {
        self.control_plane = Some(control_plane);
        self
    }

    /// Work factor for passwords hashed by the user handlers.
    #[must_use]
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    #[must_use]
    pub fn credentials(&self) -> &Arc<CredentialCache> {
        &self.credentials
    }

    #[must_use]
    pub fn passwords(&self) -> &Arc<PasswordCache> {
        &self.passwords
    }

    #[must_use]
    pub fn keys(&self) -> &Arc<PublicKeyRegistry> {
        &self.keys
    }

    fn auth_state(&self) -> AuthState {
        AuthState {
            store: self.store.clone(),
            credentials: self.credentials.clone(),
            passwords: self.passwords.clone(),
            keys: self.keys.clone(),
            invalidator: self.invalidator.clone(),
        }
    }

    fn admin_state(&self) -> AdminState {
        AdminState {
            store: self.store.clone(),
            invalidator: self.invalidator.clone(),
            keys: self.keys.clone(),
            control_plane: self.control_plane.clone(),
            bcrypt_cost: self.bcrypt_cost,
        }
    }

    /// Reconciler for the caches of this gateway.
    #[must_use]
    pub fn sync_engine(&self) -> SyncEngine {
        let scripts: Vec<Arc<dyn SyncScript>> = vec![
            Arc::new(UserSync::new(
                self.credentials.clone(),
                self.passwords.clone(),
            )),
            Arc::new(PermissionSync::new(self.credentials.clone())),
            Arc::new(PublicKeySync::new(self.keys.clone())),
        ];
        SyncEngine::new(
            self.store.clone(),
            scripts,
            self.config.sync_interval(),
            self.credentials.clone(),
            self.keys.clone(),
            DEFAULT_TENANT,
        )
    }

    /// Router forwarding unmatched routes to `es_cluster_url`.
    ///
    /// # Errors
    /// Fails when the cluster URL is invalid.
    pub fn router(&self) -> Result<Router> {
        let proxy = EsProxy::new(
            &self.config.es_cluster_url,
            self.config.store_connect_timeout(),
            self.config.store_request_timeout(),
            self.config.body_limit_bytes,
        )?;
        let downstream = Router::new()
            .fallback(proxy::forward)
            .with_state(Arc::new(proxy));
        Ok(self.router_with(downstream))
    }

    /// Router forwarding unmatched routes to `downstream`.
    pub fn router_with(&self, downstream: Router) -> Router {
        let mut router = handlers::router(self.admin_state()).fallback_service(downstream);

        // `Router::layer` wraps: the last layer added runs first on the request path.
        //
        // Request order (outermost -> innermost):
        // headers -> trace -> body limit -> domain -> classify -> log -> op -> indices
        // -> rs_query -> telemetry -> recovery -> auth -> sources -> referers -> expiry
        // -> op check -> category -> acl -> index check -> plan -> backend -> handler

        // 20) - 12) Post-authentication guards
        router = router
            .layer(from_fn_with_state(
                self.policy.clone(),
                validators::validate_backend,
            ))
            .layer(from_fn_with_state(
                self.policy.clone(),
                validators::validate_plan,
            ))
            .layer(from_fn_with_state(
                self.policy.clone(),
                validators::validate_indices,
            ))
            .layer(from_fn(validators::validate_acl))
            .layer(from_fn(validators::validate_category))
            .layer(from_fn(validators::validate_op))
            .layer(from_fn(validators::validate_expiry))
            .layer(from_fn(validators::validate_referers))
            .layer(from_fn(validators::validate_sources));

        // 11) Authentication
        router = router.layer(from_fn_with_state(self.auth_state(), auth::authenticate));

        // 10) Panic recovery for authentication, guards and handlers
        router = router.layer(recovery::layer());

        // 9) Telemetry tail, reporting rejections as well as served requests
        router = router.layer(from_fn_with_state(
            self.telemetry.clone(),
            telemetry::telemetry_tail,
        ));

        // 8) - 4) Classification
        router = router
            .layer(from_fn_with_state(
                self.config.body_limit_bytes,
                classify::capture_rs_query,
            ))
            .layer(from_fn(classify::classify_indices))
            .layer(from_fn(classify::classify_op))
            .layer(from_fn(classify::log_request))
            .layer(from_fn_with_state(
                self.routes.clone(),
                classify::classify_request,
            ));

        // 3) Tenant identification opens the request context
        router = router.layer(from_fn_with_state(self.identifier.clone(), identify_tenant));

        // 2) Body limit
        router = router.layer(RequestBodyLimitLayer::new(self.config.body_limit_bytes));

        // 1) Trace
        router = router.layer({
            use tower_http::trace::TraceLayer;
            use tracing::field::Empty;

            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<axum::body::Body>| {
                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        uri = %req.uri().path(),
                        version = ?req.version(),
                        module = "api_gateway",
                        status = Empty,
                        latency_ms = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<axum::body::Body>,
                     latency: Duration,
                     span: &tracing::Span| {
                        span.record("status", res.status().as_u16());
                        span.record("latency_ms", latency.as_millis());
                    },
                )
        });

        // 0) Response headers
        router
            .layer(SetResponseHeaderLayer::overriding(
                header::CONTENT_TYPE,
                HeaderValue::from_static(JSON_UTF8),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
    }

    /// Bind `bind_addr` and serve until `cancel` fires.
    ///
    /// # Errors
    /// Fails when the address is invalid, cannot be bound or the server errors.
    pub async fn serve(&self, cancel: CancellationToken) -> Result<()> {
        let addr: SocketAddr = self
            .config
            .bind_addr
            .parse()
            .with_context(|| format!("invalid bind address '{}'", self.config.bind_addr))?;
        let router = self.router()?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        tracing::info!(%addr, "HTTP server bound");

        let shutdown = async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully (cancellation)");
        };

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
    }
}
