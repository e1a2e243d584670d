use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use jewelry_order_api::{build_app, config::AppConfig, state::AppState};
use sea_orm::DatabaseConnection;
use serde_json::Value;
use tower::ServiceExt;

// None of these requests get far enough to touch the database.
fn app() -> Router {
    let config = AppConfig {
        database_url: "postgres://unused".into(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        jwt_expires_in_hours: 1,
    };
    build_app(AppState::new(DatabaseConnection::Disconnected, config))
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = app().oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = serde_json::from_slice(&bytes).expect("JSON error body");
    (status, body)
}

fn assert_error_envelope(body: &Value, starts_with: &str) {
    assert_eq!(body["status"], "error");
    let message = body["message"].as_str().expect("message");
    assert!(
        message.starts_with(starts_with),
        "unexpected message: {message}"
    );
}

#[tokio::test]
async fn malformed_path_ids_use_the_error_envelope() {
    let request = Request::get("/api/v1/products/abc")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "Invalid URL");
}

#[tokio::test]
async fn mistyped_json_bodies_use_the_error_envelope() {
    let request = Request::post("/api/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"email": 5, "password": "secret123"}"#))
        .unwrap();
    let (status, body) = send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "Failed to deserialize the JSON body");
}

#[tokio::test]
async fn bodies_without_json_content_type_are_bad_requests() {
    let request = Request::post("/api/v1/auth/signup")
        .body(Body::from("name=Ada"))
        .unwrap();
    let (status, body) = send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn bad_query_strings_use_the_error_envelope() {
    let request = Request::get("/api/v1/products?per_page=many")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "Failed to deserialize query string");
}

#[tokio::test]
async fn orders_require_a_bearer_token() {
    let request = Request::post("/api/v1/orders")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"orderItems":[{"product":"not-a-uuid"}]}"#))
        .unwrap();
    let (status, body) = send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["message"],
        "You are not logged in! Please log in to get access."
    );
}

#[tokio::test]
async fn unknown_routes_use_the_error_envelope() {
    let request = Request::get("/api/v1/nowhere").body(Body::empty()).unwrap();
    let (status, body) = send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Can't find /api/v1/nowhere on this server");
}
