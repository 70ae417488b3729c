//! Inbound webhook events delivered by the LINE platform
//!
//! One webhook call carries a delivery envelope with a batch of events.
//! Only message and postback events are acted on; everything else (follow,
//! unfollow, join, …) deserializes to `Event::Unsupported` and is skipped
//! by the router instead of failing the whole delivery.

use serde::Deserialize;

/// Webhook delivery envelope (one HTTP POST from the platform).
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookDelivery {
    /// Bot user ID the delivery is addressed to.
    pub destination: String,
    #[serde(default)]
    pub events: Vec<Event>,
}

/// A single webhook event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    Message(MessageEvent),
    Postback(PostbackEvent),
    #[serde(other)]
    Unsupported,
}

/// Event source (user, group or room).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Message event: a user sent the bot a message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub reply_token: String,
    pub source: EventSource,
    /// Stable per-event ID, used for redelivery dedup.
    #[serde(default)]
    pub webhook_event_id: Option<String>,
    pub message: MessageContent,
}

/// Message payload by kind. Binary kinds carry only the message ID; the
/// content itself is fetched from the data endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    Text { id: String, text: String },
    Image { id: String },
    #[serde(other)]
    Unsupported,
}

/// Postback event: a user tapped a postback action (e.g. a carousel button).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostbackEvent {
    pub reply_token: String,
    pub source: EventSource,
    #[serde(default)]
    pub webhook_event_id: Option<String>,
    pub postback: Postback,
}

/// Postback payload: the opaque data string attached to the action.
#[derive(Debug, Clone, Deserialize)]
pub struct Postback {
    pub data: String,
}
