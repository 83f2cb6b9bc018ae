//! Shared fixtures for the integration suites: an in-memory database with
//! migrations applied, an `AppState` around it and small request helpers.
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request},
};
use http_body_util::BodyExt; // for .collect()
use serde_json::Value;
use std::sync::Arc;

use accountd::api::{build_app, AppState};
use accountd::auth::token;
use accountd::config::AuthConfig;
use accountd::db::models::User;
use accountd::db::{self, tokens, DbPool};

pub const TEST_SECRET: &str = "test-token-secret-for-integration-tests-only";

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        token_secret: TEST_SECRET.to_string(),
        token_expiry_hours: 1,
        password_min_length: 5,
        max_login_failures: 5,
        login_failure_window_secs: 300,
    }
}

/// In-memory SQLite pool with every migration applied.
pub async fn setup_db() -> DbPool {
    let pool = db::connect_in_memory()
        .await
        .expect("Failed to create in-memory SQLite pool");

    sqlx::migrate!("./src/db/migrations")
        .run(&pool)
        .await
        .expect("Migration failed");

    pool
}

/// Full router without a TCP listener, plus the state behind it.
pub async fn build_test_app() -> (axum::Router, Arc<AppState>) {
    let db = setup_db().await;
    let state = Arc::new(AppState::new(db, &auth_config()));
    let cors = tower_http::cors::CorsLayer::new();
    (build_app(state.clone(), cors), state)
}

/// Bound server on a random port for tests that go through real HTTP.
pub async fn start_test_server() -> (String, Arc<AppState>) {
    let (app, state) = build_test_app().await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .await
        .ok();
    });

    (format!("http://127.0.0.1:{}", addr.port()), state)
}

/// Issue a token without going through the HTTP credential check.
pub async fn issue_token(state: &AppState, user: &User) -> String {
    let plain = token::generate();
    let digest = token::digest(&plain, &state.token_secret);
    tokens::insert(&state.db, &digest, &user.id, 1)
        .await
        .expect("Should store token");
    plain
}

pub fn json_request(method: &str, uri: &str, body: &Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(t) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    builder.body(Body::empty()).unwrap()
}

/// Read a response body as JSON.
pub async fn body_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to collect body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Body is not valid JSON")
}
