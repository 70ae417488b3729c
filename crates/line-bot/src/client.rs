//! LINE Messaging API client
//!
//! Thin reqwest client for the three provider calls the bridge makes:
//! replying to an event, fetching a user profile, and downloading message
//! content (images) from the data endpoint.

use line_types::{OutboundMessage, UserProfile};
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

const API_BASE: &str = "https://api.line.me";
const DATA_API_BASE: &str = "https://api-data.line.me";

/// Errors from the Messaging API. Propagated to the request boundary; the
/// bridge performs no retries.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider api error: status {status}: {body}")]
    Api { status: u16, body: String },
}

#[derive(Clone)]
pub struct LineClient {
    http: Client,
    channel_access_token: String,
    api_base: String,
    data_api_base: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: &'a [OutboundMessage],
}

impl LineClient {
    pub fn new(channel_access_token: String) -> Self {
        Self {
            http: Client::new(),
            channel_access_token,
            api_base: API_BASE.to_string(),
            data_api_base: DATA_API_BASE.to_string(),
        }
    }

    /// Send reply messages for the event that issued `reply_token`.
    pub async fn reply(
        &self,
        reply_token: &str,
        messages: &[OutboundMessage],
    ) -> Result<(), ProviderError> {
        debug!("Sending {} reply message(s)", messages.len());
        let response = self
            .http
            .post(format!("{}/v2/bot/message/reply", self.api_base))
            .bearer_auth(&self.channel_access_token)
            .json(&ReplyRequest { reply_token, messages })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Fetch the display profile for a user.
    pub async fn profile(&self, user_id: &str) -> Result<UserProfile, ProviderError> {
        let response = self
            .http
            .get(format!("{}/v2/bot/profile/{}", self.api_base, user_id))
            .bearer_auth(&self.channel_access_token)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// Download the binary content of a message (e.g. an image) from the
    /// data endpoint.
    pub async fn content(&self, message_id: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self
            .http
            .get(format!("{}/v2/bot/message/{}/content", self.data_api_base, message_id))
            .bearer_auth(&self.channel_access_token)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Api { status, body })
    }
}
