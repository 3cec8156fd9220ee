//! End-to-end tests for the REST API, driven through the router with
//! `tower::ServiceExt::oneshot`.

#![cfg(feature = "http-server")]

mod support;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use notes_backend::db::repositories::LocalRepository;
use notes_backend::http::{create_router, AppState};

fn app_with(repo: LocalRepository) -> Router {
    create_router(AppState::new(Arc::new(repo)))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_reports_database_state() {
    let repo = LocalRepository::new();
    let app = app_with(repo.clone());

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");

    repo.set_healthy(false);
    let (_, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(body["database"], "disconnected");
}

#[tokio::test]
async fn test_create_and_fetch_note() {
    let app = app_with(LocalRepository::new());

    let (status, created) = send(
        &app,
        Method::POST,
        "/v1/notes",
        Some(json!({ "name": "  Groceries ", "description": "milk" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Groceries");
    assert_eq!(created["body"], "milk");

    let uri = format!("/v1/notes/{}", created["id"]);
    let (status, fetched) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_create_without_name_is_bad_request() {
    let app = app_with(LocalRepository::new());

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/notes",
        Some(json!({ "description": "orphan" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert_eq!(
        body["message"],
        "Failed to create note: Name and description are required"
    );
}

#[tokio::test]
async fn test_missing_note_is_not_found() {
    let app = app_with(LocalRepository::new());

    let (status, body) = send(&app, Method::GET, "/v1/notes/7", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["message"], "Failed to fetch note: Note 7 not found");

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/v1/notes/7",
        Some(json!({ "name": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, "/v1/notes/7", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_ids_are_bad_requests() {
    let app = app_with(LocalRepository::new());

    let (status, body) = send(&app, Method::GET, "/v1/notes/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid note id: abc");

    let (status, _) = send(&app, Method::GET, "/v1/notes/0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_patch_updates_only_supplied_fields() {
    let repo = LocalRepository::new();
    let app = app_with(repo.clone());
    let note = support::seed_notes(&repo, &["draft"]).await.remove(0);

    let uri = format!("/v1/notes/{}", note.id);
    let (status, body) = send(&app, Method::PATCH, &uri, Some(json!({ "name": "final" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "final");
    assert_eq!(body["body"], "body of draft");

    let (status, _) = send(&app, Method::PATCH, &uri, Some(json!({ "name": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_returns_prior_state() {
    let repo = LocalRepository::new();
    let app = app_with(repo.clone());
    let note = support::seed_notes(&repo, &["temp"]).await.remove(0);

    let uri = format!("/v1/notes/{}", note.id);
    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "temp");
    assert_eq!(repo.note_count(), 0);
}

#[tokio::test]
async fn test_list_with_search_and_window() {
    let repo = support::seeded_local(&["alpha", "beta", "alphabet", "gamma"]).await;
    let app = app_with(repo);

    let (status, body) = send(&app, Method::GET, "/v1/notes?search=ALPHA&limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["notes"].as_array().unwrap().len(), 1);
    assert_eq!(body["notes"][0]["name"], "alphabet");

    let (_, body) = send(&app, Method::GET, "/v1/notes?limit=0", None).await;
    assert_eq!(body["total"], 4);
    assert!(body["notes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_page_endpoint() {
    let repo = support::seeded_local(&["a", "b", "c", "d", "e"]).await;
    let app = app_with(repo);

    let (status, body) = send(&app, Method::GET, "/v1/notes/page?skip=0&take=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["total"], 5);
    assert_eq!(body["has_more"], true);
    assert_eq!(body["page"], 1);
    assert_eq!(body["total_pages"], 3);

    let (status, body) = send(&app, Method::GET, "/v1/notes/page?take=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_stats_endpoint() {
    let repo = support::seeded_local(&["one", "two"]).await;
    let app = app_with(repo);

    let (status, body) = send(&app, Method::GET, "/v1/notes/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn test_unhealthy_storage_is_unavailable() {
    let repo = LocalRepository::new();
    repo.set_healthy(false);
    let app = app_with(repo);

    let (status, body) = send(&app, Method::GET, "/v1/notes", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "UNAVAILABLE");
    assert_eq!(body["details"], "Database is not healthy");
}
