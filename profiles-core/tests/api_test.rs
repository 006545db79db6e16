//! HTTP query API over a populated catalog
#![cfg(feature = "api")]

mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use profiles_core::{api, Catalog, CatalogEntry, ProfileDescription};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn seeded_catalog() -> Arc<Catalog> {
    let catalog = Arc::new(Catalog::new());
    catalog
        .add_or_replace(
            "local",
            [
                ProfileDescription::new("foo", "bar"),
                ProfileDescription::new("baz", "qux"),
            ],
        )
        .await;

    let nginx = ProfileDescription::new("nginx", "nginx profile");
    catalog
        .append(
            "weaveworks",
            ["v0.1.0", "v0.1.1", "v0.2.0"]
                .into_iter()
                .map(|tag| CatalogEntry::tagged("weaveworks", nginx.clone(), tag)),
        )
        .await;
    catalog
}

async fn get(catalog: Arc<Catalog>, uri: &str) -> (StatusCode, Value) {
    common::init_test_logging();

    let response = api::router(catalog)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_search_by_name() {
    let (status, body) = get(seeded_catalog().await, "/profiles?name=foo").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{"catalog": "local", "name": "foo", "description": "bar"}])
    );
}

#[tokio::test]
async fn test_search_without_name_lists_everything() {
    let (status, body) = get(seeded_catalog().await, "/profiles").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(5));
}

#[tokio::test]
async fn test_get_untagged_profile() {
    let catalog = seeded_catalog().await;

    let (status, body) = get(catalog.clone(), "/profiles/local/baz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"catalog": "local", "name": "baz", "description": "qux"}));

    // Tagged entries are only reachable with a version
    let (status, body) = get(catalog, "/profiles/weaveworks/nginx").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap().contains("nginx"));
}

#[tokio::test]
async fn test_get_profile_version() {
    let catalog = seeded_catalog().await;

    let (status, body) = get(catalog.clone(), "/profiles/weaveworks/nginx/v0.1.1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "tag": "v0.1.1",
            "catalog": "weaveworks",
            "name": "nginx",
            "description": "nginx profile"
        })
    );

    let (status, _) = get(catalog, "/profiles/weaveworks/nginx/v9.9.9").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_available_updates() {
    let catalog = seeded_catalog().await;

    let (status, body) = get(
        catalog.clone(),
        "/profiles/weaveworks/nginx/v0.1.0/available_updates",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let tags: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["tag"].as_str())
        .collect();
    assert_eq!(tags, vec!["v0.1.1", "v0.2.0"]);

    let (status, _) = get(catalog, "/profiles/weaveworks/nginx/v0.2.0/available_updates").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
