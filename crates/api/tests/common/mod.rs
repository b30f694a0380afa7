#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rapport_core::clock::ManualClock;
use rapport_core::importer::{ContactImporter, ImportConfig};
use rapport_core::InMemoryContactStore;
use tower::ServiceExt;

use rapport_api::app::build_router;
use rapport_api::config::ServerConfig;
use rapport_api::state::AppState;

pub const BOUNDARY: &str = "rapport-test-boundary";

/// Everything a test needs to drive the app and inspect side effects.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryContactStore>,
    pub clock: Arc<ManualClock>,
    pub importer: Arc<ContactImporter>,
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        eviction_interval_secs: 60,
        import: ImportConfig::default(),
    }
}

/// Build the full application router over an in-memory contact store.
///
/// Goes through the same `build_router` as the binary, so tests exercise
/// the production middleware stack.
pub fn build_test_app() -> TestApp {
    build_test_app_with(test_config())
}

pub fn build_test_app_with(config: ServerConfig) -> TestApp {
    let store = Arc::new(InMemoryContactStore::new());
    let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
    let importer = Arc::new(ContactImporter::new(
        store.clone(),
        clock.clone(),
        config.import.clone(),
    ));
    let state = AppState {
        importer: importer.clone(),
        store: store.clone(),
        config: Arc::new(config),
    };
    TestApp {
        router: build_router(state),
        store,
        clock,
        importer,
    }
}

/// Send a request and return status plus parsed JSON body (`Null` if empty).
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn delete(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// Build a multipart body with a `file` part and an optional `kind` part.
pub fn multipart_body(file_name: &str, content: &[u8], kind: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(kind) = kind {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"kind\"\r\n\r\n{kind}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// POST a file to the upload endpoint.
pub async fn upload(
    app: &Router,
    file_name: &str,
    content: &[u8],
    kind: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/contacts/import/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(file_name, content, kind)))
        .unwrap();
    send(app, request).await
}
