#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Headers and error rendering applied to every response.

mod common;

use std::time::Duration;

use api_gateway::GatewayConfig;
use axum::Router;
use axum::http::{StatusCode, header};
use axum::routing::get as route_get;
use common::{TENANT, admin, basic, fixture, fixture_with, get};

async fn explode() -> &'static str {
    panic!("cluster handler exploded")
}

#[tokio::test]
async fn json_content_type_and_nosniff_on_success_and_error() {
    let fx = fixture(GatewayConfig::default());
    fx.store.insert_user(TENANT, admin("foo", "bar"));

    for (auth, status) in [
        (basic("foo", "bar"), StatusCode::OK),
        (basic("foo", "nope"), StatusCode::UNAUTHORIZED),
    ] {
        let reply = get(&fx.app, "/movies/_search", &auth).await;
        assert_eq!(reply.status, status);
        assert_eq!(
            reply.headers.get(header::CONTENT_TYPE).unwrap(),
            "application/json; charset=utf-8"
        );
        assert_eq!(
            reply.headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff"
        );
    }
}

#[tokio::test]
async fn panic_downstream_is_a_500() {
    let fx = fixture_with(
        GatewayConfig::default(),
        Router::new().route("/movies/_search", route_get(explode)),
    );
    fx.store.insert_user(TENANT, admin("foo", "bar"));

    let reply = get(&fx.app, "/movies/_search", &basic("foo", "bar")).await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body["error"]["code"], 500);
    assert!(reply.message().contains("cluster handler exploded"));
}

#[tokio::test]
async fn plan_gated_route_requires_paid_plan() {
    let fx = fixture(GatewayConfig {
        plan: Some(api_gateway::Plan::Free),
        ..GatewayConfig::default()
    });
    fx.store.insert_user(TENANT, admin("foo", "bar"));

    let reply = get(&fx.app, "/_analytics/popular-searches", &basic("foo", "bar")).await;

    assert_eq!(reply.status, StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn rejected_requests_are_reported_to_telemetry() {
    let fx = fixture(GatewayConfig::default());
    fx.store.insert_user(TENANT, admin("foo", "bar"));

    let reply = get(&fx.app, "/movies/_search", &basic("foo", "nope")).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    for _ in 0..50 {
        if logs_contain("request served") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(logs_contain("request served"));
    assert!(logs_contain("status=401"));
}
