//! In-process HTTP tests over the in-memory store

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use bookshelf_server::{api, repository::MemoryRepository, AppConfig, AppState};

fn app() -> Router {
    let state = AppState::new(AppConfig::default(), Arc::new(MemoryRepository::default()));
    api::create_router(state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_user(app: &Router, username: &str) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/users",
        Some(json!({
            "name": "Test Reader",
            "email": format!("{}@example.org", username),
            "username": username,
            "password": "secret"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().unwrap()
}

async fn create_book(app: &Router, name: &str, total: i32) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/books",
        Some(json!({
            "name": name,
            "type": "Novel",
            "language": "en",
            "total_quantity": total
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().unwrap()
}

async fn available(app: &Router, book_id: i64) -> i64 {
    let (_, body) = send(app, Method::GET, &format!("/api/v1/books/{}", book_id), None).await;
    body["available_quantity"].as_i64().unwrap()
}

#[tokio::test]
async fn health_and_ready() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/api/v1/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn borrow_then_partial_return() {
    let app = app();
    let user = create_user(&app, "reader").await;
    let book = create_book(&app, "Dune", 5).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/assignments",
        Some(json!({
            "user_id": user,
            "due_date": "2025-01-01",
            "items": [{ "book_id": book, "quantity": 3 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let assignment = body[0]["id"].as_i64().unwrap();
    assert_eq!(body[0]["quantity_outstanding"], 3);
    assert_eq!(available(&app, book).await, 2);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/assignments/{}/return", assignment),
        Some(json!({ "user_id": user, "book_id": book, "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["quantity_outstanding"], 1);
    assert!(body["returned_at"].is_null());
    assert_eq!(available(&app, book).await, 4);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/assignments/{}/return", assignment),
        Some(json!({ "user_id": user, "book_id": book, "quantity": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "OverReturn");
    assert_eq!(available(&app, book).await, 4);
}

#[tokio::test]
async fn insufficient_stock_leaves_inventory_untouched() {
    let app = app();
    let user = create_user(&app, "reader").await;
    let plenty = create_book(&app, "Emma", 10).await;
    let scarce = create_book(&app, "Dune", 2).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/assignments",
        Some(json!({
            "user_id": user,
            "due_date": "2025-01-01",
            "items": [
                { "book_id": plenty, "quantity": 1 },
                { "book_id": scarce, "quantity": 4 }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "InsufficientStock");
    assert_eq!(body["code"], 8);
    assert_eq!(available(&app, plenty).await, 10);
    assert_eq!(available(&app, scarce).await, 2);

    let (_, body) = send(&app, Method::GET, &format!("/api/v1/users/{}/assignments", user), None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn malformed_borrow_requests_are_rejected() {
    let app = app();
    let user = create_user(&app, "reader").await;
    let book = create_book(&app, "Dune", 2).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/assignments",
        Some(json!({ "user_id": user, "items": [{ "book_id": book, "quantity": 1 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/assignments",
        Some(json!({
            "user_id": user,
            "due_date": "2025-01-01",
            "items": [{ "book_id": book, "quantity": 0 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidQuantity");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/assignments",
        Some(json!({
            "user_id": user,
            "due_date": "2025-01-01",
            "items": [{ "book_id": 999, "quantity": 1 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn assignment_listing_shows_history_on_request() {
    let app = app();
    let user = create_user(&app, "reader").await;
    let book = create_book(&app, "Candide", 3).await;

    let (_, body) = send(
        &app,
        Method::POST,
        "/api/v1/assignments",
        Some(json!({
            "user_id": user,
            "due_date": "2025-01-01",
            "items": [{ "book_id": book, "quantity": 1 }, { "book_id": book, "quantity": 2 }]
        })),
    )
    .await;
    let first = body[0]["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/assignments/{}/return", first),
        Some(json!({ "user_id": user, "book_id": book, "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/v1/users/{}/assignments", user);
    let (_, open) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(open.as_array().unwrap().len(), 1);
    assert_eq!(open[0]["book_name"], "Candide");
    assert_eq!(open[0]["status"], "open");

    let (_, all) = send(&app, Method::GET, &format!("{}?include_closed=true", uri), None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
    assert_eq!(all[0]["status"], "closed");
}

#[tokio::test]
async fn book_and_user_deletion_guarded_by_open_assignments() {
    let app = app();
    let user = create_user(&app, "reader").await;
    let book = create_book(&app, "Dune", 1).await;

    let (_, body) = send(
        &app,
        Method::POST,
        "/api/v1/assignments",
        Some(json!({
            "user_id": user,
            "due_date": "2025-01-01",
            "items": [{ "book_id": book, "quantity": 1 }]
        })),
    )
    .await;
    let assignment = body[0]["id"].as_i64().unwrap();

    let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/books/{}", book), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/users/{}", user), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    send(
        &app,
        Method::POST,
        &format!("/api/v1/assignments/{}/return", assignment),
        Some(json!({ "user_id": user, "book_id": book, "quantity": 1 })),
    )
    .await;

    let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/users/{}", user), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/books/{}", book), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, &format!("/api/v1/books/{}", book), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn book_search_and_user_listing() {
    let app = app();
    create_book(&app, "The Hobbit", 1).await;
    create_book(&app, "Dune", 1).await;
    create_user(&app, "alice").await;

    let (status, body) = send(&app, Method::GET, "/api/v1/books?search=hobbit", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["name"], "The Hobbit");
    assert_eq!(body["items"][0]["type"], "Novel");

    let (_, body) = send(&app, Method::GET, "/api/v1/users", None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["username"], "alice");
    assert!(body["items"][0].get("password_hash").is_none());
}

#[tokio::test]
async fn lowering_total_below_borrowed_conflicts() {
    let app = app();
    let user = create_user(&app, "reader").await;
    let book = create_book(&app, "Dune", 5).await;

    send(
        &app,
        Method::POST,
        "/api/v1/assignments",
        Some(json!({
            "user_id": user,
            "due_date": "2025-01-01",
            "items": [{ "book_id": book, "quantity": 3 }]
        })),
    )
    .await;

    let uri = format!("/api/v1/books/{}", book);
    let (status, _) = send(&app, Method::PUT, &uri, Some(json!({ "total_quantity": 2 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, Method::PUT, &uri, Some(json!({ "total_quantity": 8 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_quantity"], 8);
    assert_eq!(body["available_quantity"], 5);
}

#[tokio::test]
async fn stats_reflect_borrowed_copies() {
    let app = app();
    let user = create_user(&app, "reader").await;
    let book = create_book(&app, "Dune", 5).await;

    send(
        &app,
        Method::POST,
        "/api/v1/assignments",
        Some(json!({
            "user_id": user,
            "due_date": "2025-01-01",
            "items": [{ "book_id": book, "quantity": 3 }]
        })),
    )
    .await;

    let (status, body) = send(&app, Method::GET, "/api/v1/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_copies"], 5);
    assert_eq!(body["borrowed_copies"], 3);
    assert_eq!(body["available_copies"], 2);
    assert_eq!(body["open_assignments"], 1);
}

#[tokio::test]
async fn huge_page_returns_empty_listing() {
    let app = app();
    create_book(&app, "Dune", 1).await;
    create_user(&app, "reader").await;

    for uri in [
        "/api/v1/books?page=9223372036854775807&per_page=100",
        "/api/v1/users?page=9223372036854775807",
    ] {
        let (status, body) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"], json!([]));
    }
}

#[tokio::test]
async fn malformed_bodies_get_error_envelope() {
    let app = app();
    let user = create_user(&app, "reader").await;
    let book = create_book(&app, "Dune", 2).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/assignments",
        Some(json!({
            "user_id": user,
            "due_date": "2025-01-01",
            "items": [{ "book_id": book, "quantity": "two" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
    assert_eq!(body["code"], 5);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/assignments/1/return",
        Some(json!({ "book_id": book, "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/assignments"].is_object());
}
