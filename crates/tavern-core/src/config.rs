use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TavernError;
use crate::instruction::PersonaMode;
use crate::provider::Provider;

pub const DEFAULT_USER_NAME: &str = "Traveler";
pub const DEFAULT_ASSISTANT_NAME: &str = "Tavern Keeper";
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3000";
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Raw, file-backed configuration. Every field is optional; environment
/// variables override whatever the file holds.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub provider: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model_name: Option<String>,
    pub system_message: Option<String>,
    pub character_persona: Option<String>,
    pub character_overwrite: Option<bool>,
    pub user_name: Option<String>,
    pub assistant_name: Option<String>,
    pub bind_address: Option<String>,
    pub server_url: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the default location, falling back to an empty config when
    /// no file exists yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Overlay environment variables on top of the file values.
    ///
    /// `lookup` is normally `|key| std::env::var(key).ok()`; blank values
    /// count as unset.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("LLM_PROVIDER") {
            self.provider = Some(v);
        }
        if let Some(v) = var("OPENAI_BASE_URL") {
            self.base_url = Some(v);
        }
        if let Some(v) = var("OPENAI_API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = var("MODEL_NAME") {
            self.model_name = Some(v);
        }
        if let Some(v) = var("SYSTEM_MESSAGE") {
            self.system_message = Some(v);
        }
        if let Some(v) = var("CHARACTER_PERSONA") {
            self.character_persona = Some(v);
        }
        if let Some(v) = var("CHARACTER_OVERWRITE") {
            self.character_overwrite = Some(parse_flag(&v));
        }
        if let Some(v) = var("USER_NAME") {
            self.user_name = Some(v);
        }
        if let Some(v) = var("ASSISTANT_NAME") {
            self.assistant_name = Some(v);
        }
        if let Some(v) = var("TAVERN_ADDR") {
            self.bind_address = Some(v);
        }
        if let Some(v) = var("TAVERN_URL") {
            self.server_url = Some(v);
        }
        self
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("tavern").join("config.json"))
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Resolved deployment settings, built once and handed to whoever needs them.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub provider: Provider,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub system_message: Option<String>,
    pub character_persona: Option<String>,
    pub persona_mode: PersonaMode,
    pub user_name: String,
    pub assistant_name: String,
    pub bind_address: String,
    pub server_url: String,
}

impl Settings {
    /// Read the config file and environment, then fill in defaults.
    pub fn from_env() -> Result<Self> {
        let config = Config::load()?.with_env(|key| std::env::var(key).ok());
        Ok(Self::resolve(config)?)
    }

    pub fn resolve(config: Config) -> crate::error::Result<Self> {
        let provider = match config.provider.as_deref() {
            Some(name) => Provider::from_str(name)
                .ok_or_else(|| TavernError::config(format!("Unknown provider '{}'", name)))?,
            None => Provider::default(),
        };

        let persona_mode = if config.character_overwrite.unwrap_or(false) {
            PersonaMode::Overwrite
        } else {
            PersonaMode::Append
        };

        Ok(Self {
            provider,
            base_url: config
                .base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| provider.default_base_url().to_string()),
            api_key: config.api_key,
            model: config
                .model_name
                .unwrap_or_else(|| provider.default_model().to_string()),
            system_message: config.system_message,
            character_persona: config.character_persona,
            persona_mode,
            user_name: config
                .user_name
                .unwrap_or_else(|| DEFAULT_USER_NAME.to_string()),
            assistant_name: config
                .assistant_name
                .unwrap_or_else(|| DEFAULT_ASSISTANT_NAME.to_string()),
            bind_address: config
                .bind_address
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            server_url: config
                .server_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
        })
    }
}
