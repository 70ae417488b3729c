//! Shared types for the LINE Messaging API integration
//!
//! This crate provides the wire types used by the webhook bridge: inbound
//! webhook events, outbound reply messages (including template carousels
//! and postback actions), and user profiles.

pub mod events;
pub mod messages;
pub mod profile;

// Re-export commonly used types
pub use events::{Event, EventSource, MessageContent, MessageEvent, Postback, PostbackEvent, WebhookDelivery};
pub use messages::{Action, CarouselColumn, OutboundMessage, Template, TemplateMessage, TextMessage};
pub use profile::UserProfile;
