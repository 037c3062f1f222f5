#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Elasticsearch store against a mocked cluster.

use arc_security::{Credential, Permission, User};
use credential_store_sdk::{CredentialStore, PublicKeyRecord, StoreError};
use es_store_plugin::{ElasticsearchStore, EsStoreConfig};
use httpmock::prelude::*;
use serde_json::json;

fn store_for(server: &MockServer) -> ElasticsearchStore {
    ElasticsearchStore::new(EsStoreConfig {
        url: server.base_url(),
        ..EsStoreConfig::default()
    })
    .unwrap()
}

fn user_doc() -> serde_json::Value {
    json!({
        "username": "foo",
        "password": "$2b$04$abcdefghijklmnopqrstuu",
        "is_admin": true,
        "created_at": "2024-01-01T00:00:00Z"
    })
}

#[tokio::test]
async fn lookup_by_username_finds_user() {
    let server = MockServer::start_async().await;
    let users = server
        .mock_async(|when, then| {
            when.method(GET).path("/.users/_doc/foo");
            then.status(200)
                .json_body(json!({ "found": true, "_source": user_doc() }));
        })
        .await;
    let permissions = server
        .mock_async(|when, then| {
            when.method(GET).path("/.permissions/_doc/foo");
            then.status(404).json_body(json!({ "found": false }));
        })
        .await;

    let hit = store_for(&server)
        .lookup_by_username("default", "foo")
        .await
        .unwrap();

    users.assert_async().await;
    permissions.assert_async().await;
    match hit {
        Some(Credential::User(user)) => assert!(user.is_admin),
        other => panic!("expected user, got {other:?}"),
    }
}

#[tokio::test]
async fn lookup_by_username_in_both_indices_is_integrity_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/.users/_doc/foo");
            then.status(200)
                .json_body(json!({ "found": true, "_source": user_doc() }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/.permissions/_doc/foo");
            then.status(200).json_body(json!({
                "found": true,
                "_source": { "username": "foo", "password": "p", "owner": "o", "creator": "c" }
            }));
        })
        .await;

    let err = store_for(&server)
        .lookup_by_username("default", "foo")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Integrity(_)));
}

#[tokio::test]
async fn missing_index_reads_as_absent() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/.publickeys/_doc/public_key");
            then.status(404).json_body(json!({
                "error": { "type": "index_not_found_exception" },
                "status": 404
            }));
        })
        .await;

    let key = store_for(&server).read_public_key("default").await.unwrap();
    assert!(key.is_none());
}

#[tokio::test]
async fn create_conflict_maps_to_conflict() {
    let server = MockServer::start_async().await;
    let create = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/.permissions/_create/key")
                .query_param("refresh", "wait_for");
            then.status(409)
                .json_body(json!({ "error": { "type": "version_conflict_engine_exception" } }));
        })
        .await;

    let err = store_for(&server)
        .create_permission("default", &Permission::new("key", "secret", "foo"))
        .await
        .unwrap_err();

    create.assert_async().await;
    assert!(matches!(err, StoreError::Conflict { .. }));
}

#[tokio::test]
async fn writes_wait_for_refresh() {
    let server = MockServer::start_async().await;
    let put = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/.users/_doc/foo")
                .query_param("refresh", "wait_for");
            then.status(200).json_body(json!({ "result": "updated" }));
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path("/.users/_doc/foo")
                .query_param("refresh", "wait_for");
            then.status(200).json_body(json!({ "result": "deleted" }));
        })
        .await;

    let store = store_for(&server);
    store
        .update_user("default", &User::new("foo", "hash"))
        .await
        .unwrap();
    store.delete_user("default", "foo").await.unwrap();

    put.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test]
async fn delete_missing_is_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path("/.users/_doc/ghost");
            then.status(404).json_body(json!({ "result": "not_found" }));
        })
        .await;

    let err = store_for(&server)
        .delete_user("default", "ghost")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn role_lookup_filters_exact_matches() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/.permissions/_search");
            then.status(200).json_body(json!({
                "hits": { "hits": [
                    { "_source": { "username": "k1", "password": "p", "owner": "o", "creator": "c", "role": "admin" } },
                    { "_source": { "username": "k2", "password": "p", "owner": "o", "creator": "c", "role": "admin ops" } }
                ] }
            }));
        })
        .await;

    let store = store_for(&server);
    let hit = store.lookup_by_role("default", "admin").await.unwrap();
    assert_eq!(hit.unwrap().username, "k1");
    assert!(store.exists_with_role("default", "admin").await.unwrap());
}

#[tokio::test]
async fn server_errors_are_unavailable() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/.users/_search");
            then.status(503).body("cluster_block_exception");
        })
        .await;

    let err = store_for(&server).list_users("default").await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
}

#[tokio::test]
async fn public_key_write_normalizes_role_key() {
    let server = MockServer::start_async().await;
    let put = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/.publickeys/_doc/public_key")
                .json_body(json!({ "public_key": "cGVt", "role_key": "role" }));
            then.status(201).json_body(json!({ "result": "created" }));
        })
        .await;

    store_for(&server)
        .write_public_key(
            "default",
            &PublicKeyRecord {
                public_key: "cGVt".to_owned(),
                role_key: String::new(),
            },
        )
        .await
        .unwrap();
    put.assert_async().await;
}

#[tokio::test]
async fn dot_and_empty_usernames_resolve_to_nothing() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(400)
                .json_body(json!({ "error": "no such document path" }));
        })
        .await;

    let store = store_for(&server);
    for username in ["", ".", ".."] {
        let hit = store.lookup_by_username("default", username).await.unwrap();
        assert!(hit.is_none(), "{username:?} resolved to {hit:?}");
    }
    assert!(matches!(
        store.delete_user("default", "..").await,
        Err(StoreError::NotFound { .. })
    ));
}
