use anyhow::{anyhow, Result};
use futures_util::StreamExt;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use tavern_core::codec::Utf8Decoder;
use tavern_core::{ChatTurn, GenerationParameters};

use crate::tui::AppEvent;

/// What the background request reports to the UI
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Chunk(String),
    Finished,
    Failed(String),
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    messages: &'a [ChatTurn],
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<GenerationParameters>,
}

/// Talks to the tavern server's chat endpoint
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    url: String,
}

impl ChatClient {
    pub fn new(server_url: &str) -> Self {
        Self {
            client: Client::new(),
            url: format!("{}/api/chat", server_url.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST the conversation and forward each decoded chunk to `tx` as it
    /// arrives. Returns once the body ends or the UI stops listening.
    pub async fn stream_chat(
        &self,
        turns: &[ChatTurn],
        parameters: Option<GenerationParameters>,
        tx: &UnboundedSender<AppEvent>,
    ) -> Result<()> {
        let payload = ChatPayload {
            messages: turns,
            parameters,
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;
        tracing::info!(status = %response.status(), "raw response received");

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Chat request failed {}: {}", status, text));
        }

        let mut body = response.bytes_stream();
        let mut decoder = Utf8Decoder::new();
        while let Some(chunk) = body.next().await {
            let text = decoder.push(&chunk?);
            if !text.is_empty() && tx.send(AppEvent::Stream(StreamEvent::Chunk(text))).is_err() {
                return Ok(());
            }
        }

        let rest = decoder.finish();
        if !rest.is_empty() {
            let _ = tx.send(AppEvent::Stream(StreamEvent::Chunk(rest)));
        }
        Ok(())
    }
}

/// Run a chat request in the background; always ends with `Finished` or
/// `Failed` unless the task is aborted.
pub fn spawn_chat(
    client: ChatClient,
    turns: Vec<ChatTurn>,
    parameters: Option<GenerationParameters>,
    tx: UnboundedSender<AppEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let event = match client.stream_chat(&turns, parameters, &tx).await {
            Ok(()) => StreamEvent::Finished,
            Err(e) => {
                tracing::error!("chat error: {:#}", e);
                StreamEvent::Failed(e.to_string())
            }
        };
        let _ = tx.send(AppEvent::Stream(event));
    })
}
