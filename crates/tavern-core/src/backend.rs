use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;

use crate::error::Result;
use crate::params::GenerationParameters;
use crate::state::ChatTurn;

/// Incremental generation output. Finite, consumed once, ends after the last
/// chunk or after the first error.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Everything a backend needs for a single generation step
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub turns: Vec<ChatTurn>,
    pub system: String,
    pub parameters: Option<GenerationParameters>,
}

/// A remote text-generation provider.
///
/// `generate` resolves once the provider has accepted the request (so status
/// errors surface before any chunk is read) and yields text as it arrives.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<TextStream>;
}
