//! Outbound reply messages sent back through the Messaging API

use serde::Serialize;

/// An outbound message in a reply payload.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    Text(TextMessage),
    Template(TemplateMessage),
}

impl OutboundMessage {
    /// Plain text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextMessage { text: text.into() })
    }

    /// Carousel template message. `alt_text` is shown on clients that cannot
    /// render templates.
    pub fn carousel(alt_text: impl Into<String>, columns: Vec<CarouselColumn>) -> Self {
        Self::Template(TemplateMessage {
            alt_text: alt_text.into(),
            template: Template::Carousel { columns },
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TextMessage {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMessage {
    pub alt_text: String,
    pub template: Template,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Template {
    Carousel { columns: Vec<CarouselColumn> },
}

/// One column of a carousel template.
#[derive(Debug, Clone, Serialize)]
pub struct CarouselColumn {
    pub text: String,
    pub actions: Vec<Action>,
}

/// Action attached to a template column.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    Postback { label: String, data: String },
}

impl Action {
    pub fn postback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Postback {
            label: label.into(),
            data: data.into(),
        }
    }
}
