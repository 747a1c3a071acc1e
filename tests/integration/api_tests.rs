//! API integration tests

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

const BASE_URL: &str = "http://localhost:8080/api/v1";

async fn post(client: &Client, path: &str, body: Value) -> (StatusCode, Value) {
    let response = client
        .post(format!("{}{}", BASE_URL, path))
        .json(&body)
        .send()
        .await
        .expect("Failed to send request");
    let status = response.status();
    let body = response.json().await.expect("Failed to parse response");
    (status, body)
}

/// Create a user and a book with one copy, returning (user id, copy id)
async fn seed(client: &Client) -> (String, String) {
    let (status, user) = post(
        client,
        "/users",
        json!({ "name": "Ada", "email": format!("{}@example.com", Uuid::new_v4()) }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, book) = post(
        client,
        "/books",
        json!({
            "title": "Dune",
            "isbn": format!("978{}", &Uuid::new_v4().simple().to_string()[..10]),
            "author": "Frank Herbert",
            "numberOfPages": 412
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let book_id = book["id"].as_str().expect("book id");
    let (status, copy) = post(
        client,
        &format!("/books/{}/copies", book_id),
        json!({ "location": "A1", "condition": "good" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(copy["status"], "available");

    (
        user["id"].as_str().expect("user id").to_string(),
        copy["id"].as_str().expect("copy id").to_string(),
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
async fn test_loan_lifecycle() {
    let client = Client::new();
    let (user_id, copy_id) = seed(&client).await;
    let loan_request = json!({
        "userId": user_id,
        "bookCopyId": copy_id,
        "expiringDate": chrono::Utc::now() + chrono::Duration::days(14)
    });

    let (status, loan) = post(&client, "/loans", loan_request.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(loan["status"], "active");
    assert!(loan["returnDate"].is_null());

    // Same copy again
    let (status, error) = post(&client, "/loans", loan_request).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"], "CopyNotAvailable");

    let copy: Value = client
        .get(format!("{}/copies/{}", BASE_URL, copy_id))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(copy["status"], "lent");

    let loans: Value = client
        .get(format!("{}/loans?userId={}", BASE_URL, user_id))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(loans.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
#[ignore]
async fn test_loan_for_unknown_copy() {
    let client = Client::new();
    let (user_id, _) = seed(&client).await;

    let (status, _) = post(
        &client,
        "/loans",
        json!({
            "userId": user_id,
            "bookCopyId": Uuid::new_v4(),
            "expiringDate": chrono::Utc::now() + chrono::Duration::days(14)
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
