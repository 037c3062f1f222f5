#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Tenant isolation in multi-tenant mode.

mod common;

use axum::body::Body;
use axum::http::{Method, StatusCode};
use common::{admin, basic, fixture, for_tenant, multi_tenant, request, send};

#[tokio::test]
async fn missing_domain_header_is_unauthorized() {
    let fx = fixture(multi_tenant());

    let req = request(Method::GET, "/", Some(&basic("foo", "bar")))
        .body(Body::empty())
        .unwrap();
    let reply = send(&fx.app, req).await;

    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.message(), "X_REACTIVESEARCH_DOMAIN header is required");
}

#[tokio::test]
async fn credentials_do_not_cross_tenants() {
    let fx = fixture(multi_tenant());
    fx.store.insert_user("acme.io", admin("foo", "bar"));

    let root = |tenant: &str| {
        for_tenant(request(Method::GET, "/", Some(&basic("foo", "bar"))), tenant)
            .body(Body::empty())
            .unwrap()
    };

    let reply = send(&fx.app, root("acme.io")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(fx.gateway.credentials().get("acme.io", "foo").is_some());

    let reply = send(&fx.app, root("globex.io")).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert!(fx.gateway.credentials().get("globex.io", "foo").is_none());
    assert!(!fx.gateway.passwords().has("globex.io", "foo", "bar"));
}

#[tokio::test]
async fn same_username_resolves_per_tenant() {
    let fx = fixture(multi_tenant());
    fx.store.insert_user("acme.io", admin("foo", "bar"));
    fx.store.insert_user("globex.io", admin("foo", "baz"));

    let root = |tenant: &str, password: &str| {
        for_tenant(request(Method::GET, "/", Some(&basic("foo", password))), tenant)
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(send(&fx.app, root("acme.io", "bar")).await.status, StatusCode::OK);
    assert_eq!(send(&fx.app, root("globex.io", "baz")).await.status, StatusCode::OK);
    assert_eq!(
        send(&fx.app, root("globex.io", "bar")).await.status,
        StatusCode::UNAUTHORIZED
    );
}
