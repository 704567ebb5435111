//! Adapters exercised against an in-process HTTP server.

use apiprobe_adapters::{ChatClient, ChatModel, HttpExecutor, OpenApiLoader, WireFormat};
use apiprobe_proto::{CollaboratorError, DocumentLoader, Executor, TestCase};
use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn header(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn get_user(
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<Value> {
    Json(json!({
        "id": id,
        "query": query,
        "authorization": header(&headers, "authorization"),
    }))
}

async fn create_user(headers: HeaderMap, body: String) -> (StatusCode, Json<Value>) {
    (
        StatusCode::CREATED,
        Json(json!({
            "contentType": header(&headers, "content-type"),
            "received": body,
        })),
    )
}

async fn openai_chat(headers: HeaderMap, Json(request): Json<Value>) -> Json<Value> {
    let content = format!(
        "auth={} model={} system={} user={}",
        header(&headers, "authorization"),
        request["model"].as_str().unwrap_or_default(),
        request["messages"][0]["content"].as_str().unwrap_or_default(),
        request["messages"][1]["content"].as_str().unwrap_or_default(),
    );
    Json(json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] }))
}

async fn gemini_chat(headers: HeaderMap, Json(request): Json<Value>) -> Json<Value> {
    let text = format!(
        "key={} prompt={}",
        header(&headers, "x-goog-api-key"),
        request["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default()
    );
    Json(json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] }))
}

async fn empty_chat() -> Json<Value> {
    Json(json!({ "choices": [{ "message": { "content": "" } }] }))
}

async fn throttled() -> (StatusCode, &'static str) {
    (StatusCode::TOO_MANY_REQUESTS, "slow down")
}

async fn openapi_doc() -> Json<Value> {
    Json(json!({
        "openapi": "3.0.0",
        "servers": [{ "url": "/api" }],
        "paths": {
            "/users/{id}": { "get": { "summary": "Get user", "tags": ["users"] } }
        }
    }))
}

fn app() -> Router {
    Router::new()
        .route("/api/users/{id}", get(get_user))
        .route("/api/users", post(create_user))
        .route("/v1/chat/completions", post(openai_chat))
        .route("/v1beta/models/{model}", post(gemini_chat))
        .route("/empty/v1/chat/completions", post(empty_chat))
        .route("/throttled/v1/chat/completions", post(throttled))
        .route("/openapi.json", get(openapi_doc))
}

fn executor() -> HttpExecutor {
    HttpExecutor::new(Duration::from_secs(5), Duration::from_secs(5)).unwrap()
}

// ============================================================================
// HttpExecutor
// ============================================================================

#[tokio::test]
async fn test_executor_sends_params_and_headers() {
    let base = spawn(app()).await;
    let case = TestCase::new("get user", "get", "/users/{id}")
        .with_path_param("id", "42")
        .with_query("verbose", "yes please")
        .with_header("Authorization", "Bearer t0k");

    let result = executor().execute(&case, &format!("{base}/api/")).await.unwrap();
    assert_eq!(result.status_code, 200);
    assert!(result.success);
    assert_eq!(result.method, "GET");
    assert_eq!(result.url, format!("{base}/api/users/42?verbose=yes+please"));
    assert!(result.curl_command.starts_with("curl -X GET '"));

    let body: Value = serde_json::from_str(result.response_body.as_deref().unwrap()).unwrap();
    assert_eq!(body["id"], "42");
    assert_eq!(body["query"]["verbose"], "yes please");
    assert_eq!(body["authorization"], "Bearer t0k");
}

#[tokio::test]
async fn test_executor_path_param_stays_one_segment() {
    let base = spawn(app()).await;
    let case = TestCase::new("odd id", "GET", "/users/{id}").with_path_param("id", "a/b c?x");

    let result = executor().execute(&case, &format!("{base}/api")).await.unwrap();
    assert_eq!(result.status_code, 200);
    assert_eq!(result.url, format!("{base}/api/users/a%2Fb%20c%3Fx"));

    let body: Value = serde_json::from_str(result.response_body.as_deref().unwrap()).unwrap();
    assert_eq!(body["id"], "a/b c?x");
}

#[tokio::test]
async fn test_executor_posts_body_with_default_content_type() {
    let base = spawn(app()).await;
    let case = TestCase::new("create", "POST", "/api/users").with_body(r#"{"name":"ada"}"#);
    let result = executor().execute(&case, &base).await.unwrap();
    assert_eq!(result.status_code, 201);

    let body: Value = serde_json::from_str(result.response_body.as_deref().unwrap()).unwrap();
    assert_eq!(body["contentType"], "application/json");
    assert_eq!(body["received"], r#"{"name":"ada"}"#);
}

#[tokio::test]
async fn test_executor_records_non_2xx_without_error() {
    let base = spawn(app()).await;
    let case = TestCase::new("nowhere", "GET", "/api/nothing-here");
    let result = executor().execute(&case, &base).await.unwrap();
    assert_eq!(result.status_code, 404);
    assert!(!result.success);
    assert!(result.error_message.is_none());
}

#[tokio::test]
async fn test_executor_transport_failure_is_minus_one() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let case = TestCase::new("down", "GET", "/health");
    let result = executor()
        .execute(&case, &format!("http://{addr}"))
        .await
        .unwrap();
    assert_eq!(result.status_code, -1);
    assert!(result.is_transport_failure());
    assert!(!result.success);
    assert!(result.error_message.is_some());
    assert!(result.response_body.is_none());
}

#[tokio::test]
async fn test_executor_rejects_invalid_method() {
    let case = TestCase::new("bad", "GE T", "/x");
    let err = executor().execute(&case, "http://127.0.0.1:1").await.unwrap_err();
    assert!(matches!(err, CollaboratorError::InvalidRequest(_)));
}

// ============================================================================
// OpenApiLoader
// ============================================================================

#[tokio::test]
async fn test_loader_fetches_and_resolves_relative_server() {
    let base = spawn(app()).await;
    let loader = OpenApiLoader::new(Duration::from_secs(5)).unwrap();
    let doc = loader.load(&format!("{base}/openapi.json")).await.unwrap();
    assert_eq!(doc.base_url, Some(format!("{base}/api")));
    assert_eq!(doc.endpoints.len(), 1);
    assert_eq!(doc.endpoints[0].label(), "GET /users/{id}");
    assert_eq!(doc.endpoints[0].tags, vec!["users"]);
}

#[tokio::test]
async fn test_loader_non_2xx_is_http_error() {
    let base = spawn(app()).await;
    let loader = OpenApiLoader::new(Duration::from_secs(5)).unwrap();
    let err = loader.load(&format!("{base}/missing.json")).await.unwrap_err();
    assert!(matches!(err, CollaboratorError::Http(ref m) if m.contains("404")));
}

// ============================================================================
// ChatClient
// ============================================================================

fn chat_client(format: WireFormat, base: &str) -> ChatClient {
    ChatClient::new(format, base, "m1", "sk-test", 0.2, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_openai_compatible_chat() {
    let base = spawn(app()).await;
    let reply = chat_client(WireFormat::OpenAiCompatible, &base)
        .chat("be terse", "hello")
        .await
        .unwrap();
    assert_eq!(reply, "auth=Bearer sk-test model=m1 system=be terse user=hello");
}

#[tokio::test]
async fn test_gemini_chat_joins_prompts() {
    let base = spawn(app()).await;
    let reply = chat_client(WireFormat::Gemini, &base)
        .chat("be terse", "hello")
        .await
        .unwrap();
    assert_eq!(reply, "key=sk-test prompt=be terse\nhello");
}

#[tokio::test]
async fn test_chat_errors() {
    let base = spawn(app()).await;

    let err = chat_client(WireFormat::OpenAiCompatible, &format!("{base}/throttled"))
        .chat("s", "u")
        .await
        .unwrap_err();
    assert!(matches!(err, CollaboratorError::Http(ref m) if m.contains("429") && m.contains("slow down")));

    let err = chat_client(WireFormat::OpenAiCompatible, &format!("{base}/empty"))
        .chat("s", "u")
        .await
        .unwrap_err();
    assert!(matches!(err, CollaboratorError::Provider(_)));
}
