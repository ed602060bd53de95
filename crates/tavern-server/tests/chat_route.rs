use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use futures_util::{stream, StreamExt};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use tavern_core::{
    ChatRole, ChatTurn, GenerationBackend, GenerationRequest, Pipeline, TavernError, TextStream,
};
use tavern_server::{router, AppState};

#[derive(Default)]
struct ScriptedBackend {
    requests: Mutex<Vec<GenerationRequest>>,
    chunks: Vec<&'static str>,
    reject: bool,
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, request: GenerationRequest) -> tavern_core::Result<TextStream> {
        self.requests.lock().unwrap().push(request);
        if self.reject {
            return Err(TavernError::provider(401, "invalid api key"));
        }
        let chunks: Vec<tavern_core::Result<String>> =
            self.chunks.iter().map(|c| Ok(c.to_string())).collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

fn app(backend: Arc<ScriptedBackend>) -> axum::Router {
    let pipeline = Pipeline::new(backend, Arc::new(|| "Be helpful.".to_string()), "mock");
    router(AppState::new(pipeline))
}

fn post_chat(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_chat_streams_plain_text() {
    let backend = Arc::new(ScriptedBackend {
        chunks: vec!["<think>greet</think>", "Welcome, ", "traveler."],
        ..Default::default()
    });

    let response = app(backend.clone())
        .oneshot(post_chat(
            r#"{"messages":[{"role":"user","content":"hello"},{"role":"assistant","content":"hi"},{"role":"user","content":"room?"}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"<think>greet</think>Welcome, traveler.");

    let requests = backend.requests.lock().unwrap();
    let roles: Vec<ChatRole> = requests[0].turns.iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![ChatRole::User, ChatRole::Assistant, ChatRole::User]);
    assert_eq!(requests[0].turns[2], ChatTurn::user("room?"));
    assert_eq!(requests[0].system, "Be helpful.");
    assert_eq!(requests[0].parameters, None);
}

#[tokio::test]
async fn test_parameters_are_forwarded() {
    let backend = Arc::new(ScriptedBackend::default());
    let response = app(backend.clone())
        .oneshot(post_chat(
            r#"{"messages":[{"role":"user","content":"hi"}],"parameters":{"temperature":1.5,"maxTokens":300,"topP":0.8,"frequencyPenalty":0.2,"presencePenalty":0.1}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let requests = backend.requests.lock().unwrap();
    let params = requests[0].parameters.expect("parameters forwarded");
    assert_eq!(params.max_tokens, 300);
    assert!((params.temperature - 1.5).abs() < 1e-6);
}

#[tokio::test]
async fn test_empty_messages_reach_backend() {
    let backend = Arc::new(ScriptedBackend::default());
    let response = app(backend.clone())
        .oneshot(post_chat(r#"{"messages":[]}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(backend.requests.lock().unwrap()[0].turns.is_empty());
}

#[tokio::test]
async fn test_provider_failure_becomes_500() {
    let backend = Arc::new(ScriptedBackend {
        reject: true,
        ..Default::default()
    });
    let response = app(backend)
        .oneshot(post_chat(r#"{"messages":[{"role":"user","content":"hi"}]}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("invalid api key"));
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let backend = Arc::new(ScriptedBackend::default());
    let response = app(backend.clone())
        .oneshot(post_chat(r#"{"messages":"not a list"}"#))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
    assert!(backend.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_get_not_allowed() {
    let backend = Arc::new(ScriptedBackend::default());
    let response = app(backend)
        .oneshot(
            Request::builder()
                .uri("/api/chat")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

/// Hands out a prepared stream regardless of the request
struct StreamBackend {
    make: fn() -> TextStream,
}

#[async_trait]
impl GenerationBackend for StreamBackend {
    async fn generate(&self, _request: GenerationRequest) -> tavern_core::Result<TextStream> {
        Ok((self.make)())
    }
}

fn stream_app(make: fn() -> TextStream) -> axum::Router {
    let pipeline = Pipeline::new(
        Arc::new(StreamBackend { make }),
        Arc::new(|| "Be helpful.".to_string()),
        "mock",
    );
    router(AppState::new(pipeline))
}

#[tokio::test]
async fn test_chunks_reach_client_before_stream_ends() {
    // The reply never finishes, so the first chunk can only arrive unbuffered
    let app = stream_app(|| {
        Box::pin(stream::iter(vec![Ok("first".to_string())]).chain(stream::pending()))
    });
    let response = app
        .oneshot(post_chat(r#"{"messages":[{"role":"user","content":"hi"}]}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body().into_data_stream();
    let first = tokio::time::timeout(std::time::Duration::from_secs(2), body.next())
        .await
        .expect("first chunk arrives while the stream is still open");
    assert_eq!(&first.unwrap().unwrap()[..], b"first");
}

#[tokio::test]
async fn test_mid_stream_failure_aborts_body() {
    let app = stream_app(|| {
        Box::pin(stream::iter(vec![
            Ok("partial".to_string()),
            Err(TavernError::provider(200, "reset")),
        ]))
    });
    let response = app
        .oneshot(post_chat(r#"{"messages":[{"role":"user","content":"hi"}]}"#))
        .await
        .unwrap();

    // Headers were already sent; the failure shows up as a broken body
    assert_eq!(response.status(), StatusCode::OK);
    let err = to_bytes(response.into_body(), usize::MAX).await.unwrap_err();
    assert!(err.to_string().contains("reset"));
}
