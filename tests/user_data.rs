//! Integration tests for the user-data save/load endpoints.
//!
//! Covers the in-memory store through the router, and the HTTP blob store
//! against a wiremock blob API.

use std::sync::Arc;

use axum::body::Body;
use http::{header, Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_json, header as header_is, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chatrelay::config::{ApiKey, StorageConfig};
use chatrelay::proxy::{create_router, AppState, CompletionParams, OpenAiUpstream, Pacing};
use chatrelay::router::{ProviderRegistry, Selector};
use chatrelay::storage::{BlobStore, HttpBlobStore, MemoryBlobStore};

fn app_with(blobs: Arc<dyn BlobStore>) -> axum::Router {
    let state = AppState {
        selector: Arc::new(Selector::new(ProviderRegistry::new(Vec::new()))),
        upstream: Arc::new(OpenAiUpstream::new(reqwest::Client::new())),
        blobs,
        pacing: Pacing::default(),
        completion: CompletionParams::default(),
    };
    create_router(state)
}

fn save(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/save-user-data")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn load(email: &str) -> Request<Body> {
    Request::get(format!("/api/load-user-data?email={}", email))
        .body(Body::empty())
        .unwrap()
}

async fn parse_body(response: axum::response::Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
        .await
        .expect("read body");
    (status, serde_json::from_slice(&bytes).unwrap_or_default())
}

#[tokio::test]
async fn test_save_then_load_roundtrip_in_memory() {
    let store = Arc::new(MemoryBlobStore::new());
    let app = app_with(store.clone());

    let document = json!({"conversations": [{"title": "first"}], "theme": "dark"});
    let (status, json) = parse_body(
        app.clone()
            .oneshot(save(json!({"email": "ann+test@example.com", "data": document})))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Data saved successfully to cloud");
    assert_eq!(json["url"], "memory://ann_test@example.com.json");

    let stored = store.list().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].pathname, "ann_test@example.com.json");

    let (status, json) = parse_body(
        app.oneshot(load("ann%2Btest%40example.com")).await.unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"], document);
}

#[tokio::test]
async fn test_save_overwrites_previous_document() {
    let app = app_with(Arc::new(MemoryBlobStore::new()));

    for version in 1..=2 {
        let response = app
            .clone()
            .oneshot(save(json!({"email": "a@b.io", "data": {"version": version}})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let (_, json) = parse_body(app.oneshot(load("a@b.io")).await.unwrap()).await;
    assert_eq!(json["data"], json!({"version": 2}));
}

#[tokio::test]
async fn test_load_missing_document() {
    let app = app_with(Arc::new(MemoryBlobStore::new()));

    let (status, json) = parse_body(app.oneshot(load("nobody@example.com")).await.unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert!(json["data"].is_null());
    assert_eq!(json["message"], "No data found for this email");
}

#[tokio::test]
async fn test_invalid_email_rejected() {
    let app = app_with(Arc::new(MemoryBlobStore::new()));

    let (status, json) = parse_body(
        app.clone()
            .oneshot(save(json!({"email": "not-an-email", "data": {}})))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid email");

    let (status, json) = parse_body(app.clone().oneshot(save(json!({"data": {}}))).await.unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid email");

    let (status, json) = parse_body(
        app.oneshot(Request::get("/api/load-user-data").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid email");
}

#[tokio::test]
async fn test_malformed_query_is_json_400() {
    let app = app_with(Arc::new(MemoryBlobStore::new()));

    let response = app.oneshot(load("a@b.io&email=c@d.io")).await.unwrap();
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );

    let (status, json) = parse_body(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().starts_with("Invalid request"));
}

#[tokio::test]
async fn test_preflight_and_wrong_verbs() {
    let app = app_with(Arc::new(MemoryBlobStore::new()));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/load-user-data")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, OPTIONS"
    );

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/save-user-data")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
        "POST, OPTIONS"
    );

    let (status, json) = parse_body(
        app.oneshot(Request::get("/api/save-user-data").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json["error"], "Method not allowed");
}

fn http_store(server: &MockServer) -> HttpBlobStore {
    HttpBlobStore::new(
        reqwest::Client::new(),
        &StorageConfig {
            base_url: server.uri(),
            token: Some(ApiKey::from("blob-token")),
        },
    )
}

#[tokio::test]
async fn test_http_store_save_and_paginated_load() {
    let server = MockServer::start().await;
    let blob_url = format!("{}/files/a@b.io.json", server.uri());

    Mock::given(method("PUT"))
        .and(path("/a@b.io.json"))
        .and(header_is("authorization", "Bearer blob-token"))
        .and(header_is("x-add-random-suffix", "0"))
        .and(body_json(json!({"notes": ["x"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pathname": "a@b.io.json",
            "url": blob_url,
            "contentType": "application/json"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("limit", "1000"))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "blobs": [{"pathname": "other@b.io.json", "url": "unused"}],
            "hasMore": true,
            "cursor": "page-2"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("cursor", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "blobs": [{"pathname": "a@b.io.json", "url": blob_url}],
            "hasMore": false
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/a@b.io.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"notes": ["x"]})))
        .mount(&server)
        .await;

    let app = app_with(Arc::new(http_store(&server)));

    let (status, json) = parse_body(
        app.clone()
            .oneshot(save(json!({"email": "a@b.io", "data": {"notes": ["x"]}})))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["url"], blob_url);

    let (status, json) = parse_body(app.oneshot(load("a@b.io")).await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"], json!({"notes": ["x"]}));
}

#[tokio::test]
async fn test_http_store_failures_are_500_with_details() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let app = app_with(Arc::new(http_store(&server)));

    let (status, json) = parse_body(
        app.clone()
            .oneshot(save(json!({"email": "a@b.io", "data": {}})))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Failed to save data");
    assert!(json["details"].as_str().unwrap().contains("403"));

    let (status, json) = parse_body(app.oneshot(load("a@b.io")).await.unwrap()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Failed to load data");
    assert!(json["details"].as_str().unwrap().contains("unavailable"));
}
