//! Tavern HTTP server
//!
//! One route, `POST /api/chat`, takes the conversation as JSON and answers with
//! the model's reply as a streamed plain-text body. The pipeline does the
//! work; this crate only adapts HTTP to it and back.

use axum::{
    body::Body,
    extract::{Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use futures_util::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use tavern_core::{
    backend_from_settings, ChatTurn, ConfiguredInstruction, GenerationParameters, Pipeline,
    Settings, TextStream,
};

/// Any failure before the first byte of the reply is written
pub struct ServerError(anyhow::Error);

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

impl<E> From<E> for ServerError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Shared across requests; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let pipeline = Pipeline::new(
            backend_from_settings(settings),
            Arc::new(ConfiguredInstruction::from_settings(settings)),
            settings.model.clone(),
        );
        Self::new(pipeline)
    }
}

/// Body of `POST /api/chat`
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatTurn>,
    #[serde(default)]
    pub parameters: Option<GenerationParameters>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ServerError> {
    tracing::debug!(turns = request.messages.len(), "chat request");

    let stream = state
        .pipeline
        .process(request.messages, request.parameters)
        .await
        .inspect_err(|e| tracing::error!("generation failed: {}", e))?;

    Ok(stream_response(stream))
}

/// Wrap a text stream as a chunked `text/plain` response. Chunks go out as
/// they arrive; an error mid-way aborts the body.
pub fn stream_response(stream: TextStream) -> Response {
    let body = stream.inspect(|chunk| {
        if let Err(e) = chunk {
            tracing::warn!("stream interrupted: {}", e);
        }
    });

    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}
