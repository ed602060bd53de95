//! The message pipeline: turns in, streamed text out.

use std::sync::Arc;

use crate::backend::{GenerationBackend, GenerationRequest, TextStream};
use crate::error::Result;
use crate::instruction::SystemInstructionSource;
use crate::params::GenerationParameters;
use crate::state::ChatTurn;

/// Pre-processing hook. Currently hands the turns through untouched.
pub fn preprocess(turns: Vec<ChatTurn>) -> Vec<ChatTurn> {
    turns
}

/// Forwards a conversation to a generation backend with the resolved system
/// instruction. Holds no per-request state; one instance serves every request.
#[derive(Clone)]
pub struct Pipeline {
    backend: Arc<dyn GenerationBackend>,
    instructions: Arc<dyn SystemInstructionSource>,
    model: String,
}

impl Pipeline {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        instructions: Arc<dyn SystemInstructionSource>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            instructions,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one generation step.
    ///
    /// Turn order and content reach the backend unchanged, including an empty
    /// list. Backend errors come back as-is.
    pub async fn process(
        &self,
        turns: Vec<ChatTurn>,
        parameters: Option<GenerationParameters>,
    ) -> Result<TextStream> {
        let turns = preprocess(turns);
        let system = self.instructions.system_instruction();

        let request = GenerationRequest {
            model: self.model.clone(),
            turns,
            system,
            parameters,
        };

        self.backend.generate(request).await
    }
}
