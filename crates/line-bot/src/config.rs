//! Configuration management for line-bot

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;

/// Complete bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub line: LineConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub access: AccessConfig,
    /// Selectable models, in display order. The first entry is the default
    /// for newly created sessions.
    #[serde(default)]
    pub models: Vec<ModelEntry>,
    /// Selectable assistants, in display order. The first entry is the
    /// default for newly created sessions.
    #[serde(default)]
    pub assistants: Vec<AssistantEntry>,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// LINE channel credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineConfig {
    /// Channel access token for the Messaging API
    #[serde(default = "default_channel_access_token")]
    pub channel_access_token: String,
    /// Channel secret used to verify webhook signatures
    #[serde(default = "default_channel_secret")]
    pub channel_secret: String,
}

/// Session document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_mongo_uri")]
    pub mongo_uri: String,
    #[serde(default = "default_database")]
    pub database: String,
}

/// Completion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_api_key")]
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

/// Conversation handling knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// How many stored turns are projected into each completion request
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// Bounding box for inbound images; larger images are scaled down
    #[serde(default = "default_max_pixel")]
    pub max_pixel: u32,
    /// JPEG re-encode quality for inbound images
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

/// Access control lists. Deny wins; an empty allow list admits everyone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub allow_list: Vec<String>,
    #[serde(default)]
    pub deny_list: Vec<String>,
}

impl AccessConfig {
    pub fn permits(&self, user_id: &str) -> bool {
        if self.deny_list.iter().any(|id| id == user_id) {
            return false;
        }
        self.allow_list.is_empty() || self.allow_list.iter().any(|id| id == user_id)
    }
}

/// A selectable model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Key the session record stores and postback actions carry
    pub key: String,
    /// Provider-side model name
    pub model: String,
    #[serde(rename = "type", default)]
    pub kind: ModelKind,
    /// Whether image content may be sent to this model
    #[serde(default)]
    pub vision: bool,
    #[serde(default)]
    pub intelligence: String,
    #[serde(default)]
    pub speed: String,
    #[serde(default)]
    pub pricing: Pricing,
    /// Opaque request properties passed through to the completion call
    #[serde(default)]
    pub props: Map<String, Value>,
}

/// Model kind. Only chat models take part in conversations; other kinds are
/// reserved and currently no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Chat,
    Other,
}

/// Display pricing for the model carousel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub output: String,
}

/// A selectable assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantEntry {
    /// Key the session record stores and postback actions carry
    pub key: String,
    /// System instructions prepended to every completion request
    pub instructions: String,
    #[serde(default)]
    pub description: String,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }

    /// Reject configurations the bridge cannot start with. Stale session
    /// references are handled at use time; an empty catalogue is not.
    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            bail!("at least one model must be configured");
        }
        if self.assistants.is_empty() {
            bail!("at least one assistant must be configured");
        }
        Ok(())
    }

    /// Look up a configured model by key
    pub fn model(&self, key: &str) -> Option<&ModelEntry> {
        self.models.iter().find(|entry| entry.key == key)
    }

    /// Look up a configured assistant by key
    pub fn assistant(&self, key: &str) -> Option<&AssistantEntry> {
        self.assistants.iter().find(|entry| entry.key == key)
    }

    /// Default model for newly created sessions (first configured)
    pub fn default_model_key(&self) -> &str {
        self.models.first().map(|entry| entry.key.as_str()).unwrap_or_default()
    }

    /// Default assistant for newly created sessions (first configured)
    pub fn default_assistant_key(&self) -> &str {
        self.assistants.first().map(|entry| entry.key.as_str()).unwrap_or_default()
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9999
}

fn default_channel_access_token() -> String {
    std::env::var("LINE_CHANNEL_ACCESS_TOKEN").unwrap_or_default()
}

fn default_channel_secret() -> String {
    std::env::var("LINE_CHANNEL_SECRET").unwrap_or_default()
}

fn default_mongo_uri() -> String {
    std::env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
}

fn default_database() -> String {
    "line_llm_bridge".to_string()
}

fn default_openai_api_key() -> String {
    std::env::var("OPENAI_API_KEY").unwrap_or_default()
}

fn default_openai_base_url() -> String {
    std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string())
}

fn default_max_history() -> usize {
    10
}

fn default_max_pixel() -> u32 {
    1280
}

fn default_jpeg_quality() -> u8 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mongo_uri: default_mongo_uri(),
            database: default_database(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: default_openai_api_key(),
            base_url: default_openai_base_url(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            max_pixel: default_max_pixel(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}
