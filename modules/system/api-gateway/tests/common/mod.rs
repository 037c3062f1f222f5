//! Shared fixture: a gateway over an in-memory store and a stub cluster.
#![allow(dead_code)]

use std::sync::Arc;

use api_gateway::{DOMAIN_HEADER, Gateway, GatewayConfig};
use arc_security::{Permission, User};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use axum::routing::any;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use static_store_plugin::StaticStore;
use tower::ServiceExt;

pub const TENANT: &str = "default";
pub const DOMAIN_KEY: &str = "0123456789abcdef";
pub const CLUSTER_BODY: &str = r#"{"took":3,"hits":{"total":0,"hits":[]}}"#;

pub struct Fixture {
    pub gateway: Gateway,
    pub store: Arc<StaticStore>,
    pub app: Router,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Reply {
    pub fn message(&self) -> &str {
        self.body["error"]["message"]
            .as_str()
            .or_else(|| self.body["message"].as_str())
            .unwrap_or_default()
    }
}

/// Stands in for the search cluster behind the gateway.
pub fn cluster() -> Router {
    Router::new().fallback(any(|| async { CLUSTER_BODY }))
}

pub fn fixture(config: GatewayConfig) -> Fixture {
    fixture_with(config, cluster())
}

pub fn fixture_with(config: GatewayConfig, downstream: Router) -> Fixture {
    let store = Arc::new(StaticStore::new());
    let gateway = Gateway::new(config, store.clone())
        .unwrap()
        .with_bcrypt_cost(4);
    let app = gateway.router_with(downstream);
    Fixture {
        gateway,
        store,
        app,
    }
}

pub fn multi_tenant() -> GatewayConfig {
    GatewayConfig {
        multi_tenant: true,
        domain_name_encryption_key: Some(DOMAIN_KEY.to_owned()),
        ..GatewayConfig::default()
    }
}

pub fn basic(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

pub fn user(username: &str, password: &str) -> User {
    User::new(username, bcrypt::hash(password, 4).unwrap())
}

pub fn admin(username: &str, password: &str) -> User {
    let mut user = user(username, password);
    user.is_admin = true;
    user.normalize();
    user
}

pub fn permission(username: &str, password: &str) -> Permission {
    let mut permission = Permission::new(username, password, "foo");
    permission.normalize();
    permission
}

pub fn request(method: Method, uri: &str, auth: Option<&str>) -> axum::http::request::Builder {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder
}

pub fn for_tenant(builder: axum::http::request::Builder, tenant: &str) -> axum::http::request::Builder {
    builder.header(DOMAIN_HEADER, tenant)
}

pub async fn send(app: &Router, req: Request<Body>) -> Reply {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    Reply {
        status,
        headers,
        body,
    }
}

pub async fn get(app: &Router, uri: &str, auth: &str) -> Reply {
    send(app, request(Method::GET, uri, Some(auth)).body(Body::empty()).unwrap()).await
}
