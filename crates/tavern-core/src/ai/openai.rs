use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::backend::{GenerationBackend, GenerationRequest, TextStream};
use crate::codec::response_lines;
use crate::error::{Result, TavernError};

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
}

impl<'a> OpenAIRequest<'a> {
    fn from_request(request: &'a GenerationRequest) -> Self {
        // System instruction travels as the leading message
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        messages.push(OpenAIMessage {
            role: "system",
            content: &request.system,
        });
        messages.extend(request.turns.iter().map(|turn| OpenAIMessage {
            role: turn.role.as_str(),
            content: &turn.content,
        }));

        let params = request.parameters;
        Self {
            model: &request.model,
            messages,
            stream: true,
            temperature: params.map(|p| p.temperature),
            max_tokens: params.map(|p| p.max_tokens),
            top_p: params.map(|p| p.top_p),
            frequency_penalty: params.map(|p| p.frequency_penalty),
            presence_penalty: params.map(|p| p.presence_penalty),
        }
    }
}

#[derive(Deserialize)]
struct OpenAIChunk {
    #[serde(default)]
    choices: Vec<OpenAIChunkChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct OpenAIChunkChoice {
    #[serde(default)]
    delta: OpenAIDelta,
}

#[derive(Deserialize, Default)]
struct OpenAIDelta {
    #[serde(default)]
    content: Option<String>,
}

/// One decoded line of the server-sent event stream
#[derive(Debug, PartialEq)]
enum SseEvent {
    Delta(String),
    Done,
    Ignore,
}

fn parse_sse_line(line: &str) -> Result<SseEvent> {
    let line = line.trim();
    let data = match line.strip_prefix("data:") {
        Some(data) => data.trim_start(),
        // Blank separators, comments, `event:` and `id:` fields
        None => return Ok(SseEvent::Ignore),
    };

    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }

    let chunk: OpenAIChunk = serde_json::from_str(data)?;
    if let Some(error) = chunk.error {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(TavernError::provider(200, message));
    }

    let text: String = chunk
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .collect();

    if text.is_empty() {
        Ok(SseEvent::Ignore)
    } else {
        Ok(SseEvent::Delta(text))
    }
}

/// Streams chat completions from any OpenAI-compatible endpoint
#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAIClient {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
        }
    }
}

#[async_trait]
impl GenerationBackend for OpenAIClient {
    async fn generate(&self, request: GenerationRequest) -> Result<TextStream> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = OpenAIRequest::from_request(&request);

        tracing::debug!(
            model = %request.model,
            turns = request.turns.len(),
            "dispatching OpenAI-compatible completion"
        );

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(TavernError::provider(status.as_u16(), text));
        }

        let mut lines = response_lines(response);
        let stream = async_stream::stream! {
            while let Some(line) = lines.next().await {
                let event = match line {
                    Ok(line) => parse_sse_line(&line),
                    Err(e) => Err(e),
                };
                match event {
                    Ok(SseEvent::Delta(text)) => yield Ok(text),
                    Ok(SseEvent::Done) => return,
                    Ok(SseEvent::Ignore) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
