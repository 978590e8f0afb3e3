use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::test_profile;
use crate::metadata::MetadataExtractor;
use crate::scrape::headless::{ChromeOptions, Renderer};
use crate::web::{router, SharedState};

fn state() -> SharedState {
    let renderer = Renderer::new(false, ChromeOptions::default());
    SharedState::new(MetadataExtractor::new(test_profile(), renderer))
}

async fn post(state: &SharedState, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let resp = router(state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_metadata_endpoint_uses_camel_case() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.path("/");
            then.status(200)
                .body(r#"<title>Api</title><meta property="og:image" content="/og.png">"#);
        })
        .await;

    let (status, body) = post(&state(), "/api/metadata", json!({"url": server.url("/")})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Api");
    assert_eq!(body["faviconUrl"], server.url("/favicon.ico"));
    assert_eq!(body["ogImageUrl"], server.url("/og.png"));
}

#[tokio::test]
async fn test_metadata_endpoint_degrades_to_empty() {
    let (status, body) = post(&state(), "/api/metadata", json!({"url": "not a url"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"title": "", "faviconUrl": null, "ogImageUrl": null}));
}

#[tokio::test]
async fn test_bookmark_lifecycle() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.path("/");
            then.status(200).body("<title>Saved</title>");
        })
        .await;

    let state = state();
    let (status, created) = post(
        &state,
        "/api/bookmarks/create",
        json!({"url": server.url("/")}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["title"], "Saved");
    let id = created["id"].as_u64().unwrap();

    let (status, fetched) = post(&state, "/api/bookmarks/get", json!({"id": id})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, _) = post(&state, "/api/bookmarks/delete", json!({"id": id})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(&state, "/api/bookmarks/get", json!({"id": id})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "bookmark not found");

    let (status, _) = post(&state, "/api/bookmarks/delete", json!({"id": id})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_requires_url() {
    let state = state();
    let (status, _) = post(&state, "/api/bookmarks/create", json!({"url": "  "})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(state.store.is_empty());
}
