pub mod ollama;
pub mod openai;

pub use ollama::OllamaClient;
pub use openai::OpenAIClient;

use std::sync::Arc;

use crate::backend::GenerationBackend;
use crate::config::Settings;
use crate::provider::Provider;

/// Build the backend the settings ask for
pub fn backend_from_settings(settings: &Settings) -> Arc<dyn GenerationBackend> {
    match settings.provider {
        Provider::OpenAI => Arc::new(OpenAIClient::new(
            &settings.base_url,
            settings.api_key.as_deref(),
        )),
        Provider::Ollama => Arc::new(OllamaClient::new(&settings.base_url)),
    }
}
