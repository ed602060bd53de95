use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::backend::{GenerationBackend, GenerationRequest, TextStream};
use crate::codec::response_lines;
use crate::error::{Result, TavernError};

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

impl<'a> OllamaRequest<'a> {
    fn from_request(request: &'a GenerationRequest) -> Self {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        messages.push(OllamaMessage {
            role: "system",
            content: &request.system,
        });
        messages.extend(request.turns.iter().map(|turn| OllamaMessage {
            role: turn.role.as_str(),
            content: &turn.content,
        }));

        Self {
            model: &request.model,
            messages,
            stream: true,
            options: request.parameters.map(|p| OllamaOptions {
                temperature: p.temperature,
                num_predict: p.max_tokens,
                top_p: p.top_p,
                frequency_penalty: p.frequency_penalty,
                presence_penalty: p.presence_penalty,
            }),
        }
    }
}

#[derive(Deserialize)]
struct OllamaChunk {
    #[serde(default)]
    message: Option<OllamaChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaChunkMessage {
    #[serde(default)]
    content: String,
}

/// Decoded NDJSON line: the text it carries and whether it was the last one
fn parse_ndjson_line(line: &str) -> Result<Option<(String, bool)>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let chunk: OllamaChunk = serde_json::from_str(line)?;
    if let Some(error) = chunk.error {
        return Err(TavernError::provider(200, error));
    }

    let text = chunk.message.map(|m| m.content).unwrap_or_default();
    Ok(Some((text, chunk.done)))
}

/// Streams chat replies from a local Ollama server
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GenerationBackend for OllamaClient {
    async fn generate(&self, request: GenerationRequest) -> Result<TextStream> {
        let url = format!("{}/api/chat", self.base_url);
        let body = OllamaRequest::from_request(&request);

        tracing::debug!(
            model = %request.model,
            turns = request.turns.len(),
            "dispatching Ollama chat"
        );

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(TavernError::provider(
                status.as_u16(),
                format!("{} (make sure Ollama is running with: ollama serve)", text),
            ));
        }

        let mut lines = response_lines(response);
        let stream = async_stream::stream! {
            while let Some(line) = lines.next().await {
                let parsed = match line {
                    Ok(line) => parse_ndjson_line(&line),
                    Err(e) => Err(e),
                };
                match parsed {
                    Ok(Some((text, done))) => {
                        if !text.is_empty() {
                            yield Ok(text);
                        }
                        if done {
                            return;
                        }
                    }
                    Ok(None) => {}
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
