//! HTTP routing integration tests
//!
//! Exercises the router end to end against an in-memory database. The
//! external metadata sources are never hit: these tests only use the
//! endpoints that work from local data.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use biblio_api::{build_router, AppState};
use biblio_common::config::ServiceConfig;

async fn test_state() -> AppState {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    biblio_common::db::init::create_all_tables(&pool).await.unwrap();

    let mut config = ServiceConfig::default();
    config.uploads_dir = std::env::temp_dir().join(format!("biblio-test-{}", uuid::Uuid::new_v4()));

    AppState::new(pool, config).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn json_request_with_token(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Run /setup and log in as one of the seeded accounts.
async fn setup_and_login(app: &axum::Router, email: &str, password: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/auth/setup", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            json!({ "email": email, "password": password }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_reports_module_and_uptime() {
    let app = build_router(test_state().await);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "biblio-api");
    assert!(body["uptime_seconds"].as_u64().is_some());
}

#[tokio::test]
async fn manual_add_then_fetch_round_trip() {
    let app = build_router(test_state().await);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/books/add-manual",
            json!({
                "title": "El túnel",
                "author": "Ernesto Sabato",
                "isbn": "9789561234567",
                "pageCount": 158
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["title"], "El túnel");
    assert_eq!(created["location"], "Biblioteca Principal");
    let id = created["guid"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/books/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/api/books?search=tunel")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let list = body_json(response).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn manual_add_without_isbn_mints_placeholder() {
    let app = build_router(test_state().await);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/books/add-manual",
            json!({ "title": "Cuaderno sin código", "author": "Anónimo" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let created = body_json(response).await;
    assert!(created["isbn"].as_str().unwrap().starts_with("manual-"));
}

#[tokio::test]
async fn duplicate_isbn_is_a_conflict() {
    let app = build_router(test_state().await);
    let body = json!({
        "title": "El túnel",
        "author": "Ernesto Sabato",
        "isbn": "9789561234567"
    });

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/books/add-manual", body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(json_request("POST", "/api/books/add-manual", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let error = body_json(response).await;
    assert_eq!(error["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn missing_book_is_not_found() {
    let app = build_router(test_state().await);

    let response = app
        .oneshot(get(&format!("/api/books/{}", uuid::Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reading_status_requires_authentication() {
    let app = build_router(test_state().await);

    let response = app
        .oneshot(json_request(
            "PUT",
            &format!("/api/books/{}/reading-status", uuid::Uuid::new_v4()),
            json!({ "person": "adaly", "read": true }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reviewer_cannot_edit_the_other_reviewers_entry() {
    let app = build_router(test_state().await);
    let token = setup_and_login(&app, "tatan@rodrigo.lat", "sebastian123").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/books/add-manual",
            json!({ "title": "Rayuela", "author": "Julio Cortázar" }),
        ))
        .await
        .unwrap();
    let id = body_json(response).await["guid"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request_with_token(
            "PUT",
            &format!("/api/books/{}/reading-status", id),
            &token,
            json!({ "person": "adaly", "read": true }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Own entry works, and marking read stamps a review date
    let response = app
        .oneshot(json_request_with_token(
            "PUT",
            &format!("/api/books/{}/reading-status", id),
            &token,
            json!({ "person": "sebastian", "read": true, "rating": 8 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let book = body_json(response).await;
    assert_eq!(book["readingStatus"]["sebastian"]["read"], true);
    assert_eq!(book["readingStatus"]["sebastian"]["rating"], 8);
    assert!(book["readingStatus"]["sebastian"]["reviewDate"].is_string());
}

#[tokio::test]
async fn out_of_range_rating_is_rejected() {
    let app = build_router(test_state().await);
    let token = setup_and_login(&app, "adaly@arcia.net", "adaly123").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/books/add-manual",
            json!({ "title": "Ficciones", "author": "Jorge Luis Borges" }),
        ))
        .await
        .unwrap();
    let id = body_json(response).await["guid"].as_str().unwrap().to_string();

    let response = app
        .oneshot(json_request_with_token(
            "PUT",
            &format!("/api/books/{}/reading-status", id),
            &token,
            json!({ "person": "adaly", "read": true, "rating": 11 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn setup_is_one_shot() {
    let app = build_router(test_state().await);

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/auth/setup", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["users"].as_array().unwrap().len(), 3);

    let response = app
        .oneshot(json_request("POST", "/api/auth/setup", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = build_router(test_state().await);
    setup_and_login(&app, "admin@nuestrabiblioteca.com", "admin123").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            json!({ "email": "admin@nuestrabiblioteca.com", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn user_management_is_admin_only() {
    let app = build_router(test_state().await);
    let reviewer_token = setup_and_login(&app, "adaly@arcia.net", "adaly123").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/auth/users")
                .header(header::AUTHORIZATION, format!("Bearer {}", reviewer_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            json!({ "email": "admin@nuestrabiblioteca.com", "password": "admin123" }),
        ))
        .await
        .unwrap();
    let admin_token = body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/users")
                .header(header::AUTHORIZATION, format!("Bearer {}", admin_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let users = body_json(response).await;
    assert_eq!(users.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn category_creation_is_idempotent_on_name() {
    let app = build_router(test_state().await);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/categories",
            json!({ "name": "Novela" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let first = body_json(response).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/categories",
            json!({ "name": "novela" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let second = body_json(response).await;

    assert_eq!(first["guid"], second["guid"]);
}

#[tokio::test]
async fn stats_overview_counts_books() {
    let app = build_router(test_state().await);

    for (title, isbn) in [("A", "1000000000001"), ("B", "1000000000002")] {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/books/add-manual",
                json!({ "title": title, "author": "x", "isbn": isbn }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app.oneshot(get("/api/stats/overview")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stats = body_json(response).await;
    assert_eq!(stats["totalBooks"], 2);
    assert_eq!(stats["adalyRead"], 0);
    assert_eq!(stats["unreadBySebastian"], 2);
}

#[tokio::test]
async fn export_serves_an_xlsx_attachment() {
    let app = build_router(test_state().await);

    let response = app.oneshot(get("/api/import/export")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("spreadsheetml"));

    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("biblioteca_export.xlsx"));
}

#[tokio::test]
async fn upload_requires_authentication() {
    let app = build_router(test_state().await);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/upload/cover-from-url",
            json!({ "url": "https://example.com/cover.jpg" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
