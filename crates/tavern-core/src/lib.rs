pub mod ai;
pub mod backend;
pub mod codec;
pub mod config;
pub mod conversation;
pub mod error;
pub mod instruction;
pub mod params;
pub mod parser;
pub mod pipeline;
pub mod provider;
pub mod state;

// Re-export main types for convenience
pub use ai::{backend_from_settings, OllamaClient, OpenAIClient};
pub use backend::{GenerationBackend, GenerationRequest, TextStream};
pub use config::{Config, Settings};
pub use conversation::Conversation;
pub use error::{Result, TavernError};
pub use instruction::{
    resolve_system_instruction, ConfiguredInstruction, PersonaMode, SystemInstructionSource,
};
pub use params::{GenerationParameters, ParamKind};
pub use parser::{parse_content, ParsedContent};
pub use pipeline::Pipeline;
pub use provider::Provider;
pub use state::{ChatRole, ChatTurn};
