//! Live API tests against a running server

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

/// Helper to create a uniquely named user and a book, returning their ids
async fn seed(client: &Client, total: i32) -> (i64, i64) {
    let suffix = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();

    let user: Value = client
        .post(format!("{}/users", BASE_URL))
        .json(&json!({
            "name": "Live Reader",
            "email": format!("live{}@example.org", suffix),
            "username": format!("live{}", suffix),
            "password": "secret"
        }))
        .send()
        .await
        .expect("Failed to send user request")
        .json()
        .await
        .expect("Failed to parse user response");

    let book: Value = client
        .post(format!("{}/books", BASE_URL))
        .json(&json!({
            "name": format!("Live book {}", suffix),
            "type": "Novel",
            "language": "en",
            "total_quantity": total
        }))
        .send()
        .await
        .expect("Failed to send book request")
        .json()
        .await
        .expect("Failed to parse book response");

    (
        user["id"].as_i64().expect("No user id"),
        book["id"].as_i64().expect("No book id"),
    )
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_ready_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore]
async fn test_borrow_and_return() {
    let client = Client::new();
    let (user_id, book_id) = seed(&client, 5).await;

    let response = client
        .post(format!("{}/assignments", BASE_URL))
        .json(&json!({
            "user_id": user_id,
            "due_date": "2025-01-01",
            "items": [{ "book_id": book_id, "quantity": 3 }]
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    let assignment_id = body[0]["id"].as_i64().expect("No assignment id");

    let response = client
        .post(format!("{}/assignments/{}/return", BASE_URL, assignment_id))
        .json(&json!({ "user_id": user_id, "book_id": book_id, "quantity": 2 }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["quantity_outstanding"], 1);

    let book: Value = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(book["available_quantity"], 4);
}

#[tokio::test]
#[ignore]
async fn test_borrow_insufficient_stock() {
    let client = Client::new();
    let (user_id, book_id) = seed(&client, 2).await;

    let response = client
        .post(format!("{}/assignments", BASE_URL))
        .json(&json!({
            "user_id": user_id,
            "due_date": "2025-01-01",
            "items": [{ "book_id": book_id, "quantity": 4 }]
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "InsufficientStock");
}

#[tokio::test]
#[ignore]
async fn test_get_nonexistent_book() {
    let client = Client::new();

    let response = client
        .get(format!("{}/books/999999", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 404);
}
