//! Exercises the Ollama gateway against an in-process HTTP stub: happy path,
//! context token carry-over, and the graceful-degradation paths.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::{Value, json};
use uuid::Uuid;

use converse_backend::llm::ollama::{FALLBACK_RESPONSE, OllamaClient};

#[derive(Clone)]
struct MockState {
    requests: Arc<Mutex<Vec<Value>>>,
    reply: Arc<Value>,
}

async fn generate_handler(State(state): State<MockState>, Json(body): Json<Value>) -> Json<Value> {
    state.requests.lock().unwrap().push(body);
    Json(state.reply.as_ref().clone())
}

/// Serves `reply` for every POST and records the request bodies.
async fn spawn_mock(reply: Value) -> (String, Arc<Mutex<Vec<Value>>>) {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        requests: requests.clone(),
        reply: Arc::new(reply),
    };
    let app = Router::new()
        .route("/api/generate", post(generate_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/api/generate"), requests)
}

fn client(url: String) -> OllamaClient {
    OllamaClient::new(url, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_generate_returns_response_text() {
    let (url, _requests) = spawn_mock(json!({ "response": "Hi there!", "done": true })).await;
    let gateway = client(url);

    let reply = gateway
        .generate("llama3.2:3b", "User: hello\nAssistant:", Uuid::new_v4())
        .await;
    assert_eq!(reply, "Hi there!");
}

#[tokio::test]
async fn test_generate_carries_context_token_across_calls() {
    let (url, requests) =
        spawn_mock(json!({ "response": "ok", "context": [11, 22, 33] })).await;
    let gateway = client(url);
    let conversation_id = Uuid::new_v4();

    gateway.generate("llama3.2:3b", "first", conversation_id).await;
    gateway.generate("llama3.2:3b", "second", conversation_id).await;
    // A different conversation must not inherit the token.
    gateway.generate("llama3.2:3b", "other", Uuid::new_v4()).await;

    let recorded = requests.lock().unwrap();
    assert_eq!(recorded.len(), 3);
    assert!(recorded[0].get("context").is_none());
    assert_eq!(recorded[1]["context"], json!([11, 22, 33]));
    assert!(recorded[2].get("context").is_none());
}

#[tokio::test]
async fn test_forget_context_resets_the_token() {
    let (url, requests) = spawn_mock(json!({ "response": "ok", "context": [7] })).await;
    let gateway = client(url);
    let conversation_id = Uuid::new_v4();

    gateway.generate("llama3.2:3b", "first", conversation_id).await;
    gateway.forget_context(conversation_id);
    gateway.generate("llama3.2:3b", "second", conversation_id).await;

    let recorded = requests.lock().unwrap();
    assert!(recorded[1].get("context").is_none());
}

#[tokio::test]
async fn test_generate_missing_response_field_falls_back() {
    let (url, _requests) = spawn_mock(json!({ "done": true })).await;
    let gateway = client(url);

    let reply = gateway.generate("llama3.2:3b", "hello", Uuid::new_v4()).await;
    assert_eq!(reply, FALLBACK_RESPONSE);
}

#[tokio::test]
async fn test_generate_connection_refused_falls_back() {
    // Port 1 is never listening.
    let gateway = client("http://127.0.0.1:1/api/generate".to_string());

    let reply = gateway.generate("llama3.2:3b", "hello", Uuid::new_v4()).await;
    assert_eq!(reply, FALLBACK_RESPONSE);
}

#[tokio::test]
async fn test_generate_server_error_falls_back() {
    async fn failing_handler() -> impl IntoResponse {
        StatusCode::INTERNAL_SERVER_ERROR
    }
    let app = Router::new().route("/api/generate", post(failing_handler));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let gateway = client(format!("http://{addr}/api/generate"));
    let reply = gateway.generate("llama3.2:3b", "hello", Uuid::new_v4()).await;
    assert_eq!(reply, FALLBACK_RESPONSE);
}

#[tokio::test]
async fn test_stream_yields_fragments_in_order() {
    async fn ndjson_handler() -> impl IntoResponse {
        (
            [(header::CONTENT_TYPE, "application/x-ndjson")],
            concat!(
                "{\"response\":\"Hello\"}\n",
                "{\"response\":\" there\"}\n",
                "not json at all\n",
                "{\"response\":\"!\"}\n",
                "{\"done\":true}\n",
            ),
        )
    }
    let app = Router::new().route("/api/generate", post(ndjson_handler));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let gateway = client(format!("http://{addr}/api/generate"));
    let fragments: Vec<String> = gateway
        .generate_stream("llama3.2:3b", "hello")
        .filter_map(|item| async move { item.ok() })
        .collect()
        .await;

    assert_eq!(fragments, vec!["Hello", " there", "!"]);
}

#[tokio::test]
async fn test_stream_connection_refused_yields_fallback_fragment() {
    let gateway = client("http://127.0.0.1:1/api/generate".to_string());

    let fragments: Vec<String> = gateway
        .generate_stream("llama3.2:3b", "hello")
        .filter_map(|item| async move { item.ok() })
        .collect()
        .await;

    assert_eq!(fragments, vec![FALLBACK_RESPONSE.to_string()]);
}
