//! Client for OpenAI-compatible chat completion endpoints
//!
//! Handles the single call the bridge makes per conversational turn:
//! system instructions + a bounded history window in, reply text out.
//! Per-model request properties are passed through opaquely so deployments
//! can tune temperature, max_tokens and friends without code changes.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// A single conversation turn on the wire.
/// `content` is a plain JSON string for text-only messages, or a JSON array
/// of content parts (`text` / `image_url`) for multimodal turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    /// Either `Value::String("…")` or `Value::Array([{type,…}, …])`.
    pub content: Value,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: Value) -> Self {
        Self { role: role.into(), content }
    }
}

/// Errors from the completion endpoint. The bridge does not retry; a failed
/// call surfaces as a failed turn.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion api error: status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("completion response carried no reply text")]
    EmptyResponse,
}

/// Chat completions client.
#[derive(Clone)]
pub struct CompletionClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl CompletionClient {
    /// Create a new client. `base_url` is the API root, e.g.
    /// `https://api.openai.com/v1`.
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            base_url,
        }
    }

    /// Run one completion call and return the reply text.
    ///
    /// `props` is the opaque per-model property set; entries are merged into
    /// the request body but can never clobber `model` or `messages`.
    pub async fn complete(
        &self,
        model: &str,
        system: &str,
        messages: Vec<ChatMessage>,
        props: &Map<String, Value>,
    ) -> Result<String, CompletionError> {
        let body = build_body(model, system, messages, props);

        debug!(model, "Sending chat completion request");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, "Chat completion request failed: {}", body);
            return Err(CompletionError::Api { status, body });
        }

        let completion: ChatCompletionResponse = response.json().await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::EmptyResponse)
    }
}

/// Assemble the request body: system entry first, then the history window,
/// then the opaque props (which lose against the reserved keys).
pub fn build_body(
    model: &str,
    system: &str,
    messages: Vec<ChatMessage>,
    props: &Map<String, Value>,
) -> Value {
    let mut all = Vec::with_capacity(messages.len() + 1);
    all.push(ChatMessage::new("system", Value::String(system.to_string())));
    all.extend(messages);

    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(model.to_string()));
    body.insert(
        "messages".to_string(),
        serde_json::to_value(&all).expect("chat messages serialize"),
    );
    for (key, value) in props {
        body.entry(key.clone()).or_insert_with(|| value.clone());
    }
    Value::Object(body)
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
