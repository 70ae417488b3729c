//! Session records and the document store adapter
//!
//! One record per LINE user, holding the active model/assistant keys and the
//! durable conversation history. Updates are targeted `$set`s on single
//! fields, never whole-document replaces.

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;

use mongodb::bson::doc;
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Result type alias
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors from the session store. Propagated to the request boundary; the
/// bridge performs no retries.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(#[from] mongodb::error::Error),

    #[error("failed to encode session data: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),
}

/// Turn author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Turn content: a plain string for text-only turns, or an ordered sequence
/// of typed parts for multimodal turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One typed part of a multimodal turn, in chat-completions wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

/// One message-equivalent unit of conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
}

impl Turn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text(text.into()),
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Text(text.into()),
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Parts(parts),
        }
    }
}

/// Per-user session record, keyed by the external user ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// LINE user ID; unique, immutable, assigned at creation
    pub id: String,
    /// Active assistant key; validated only at use time
    pub assistant: String,
    /// Active model key; validated only at use time
    pub model: String,
    #[serde(default)]
    pub conversation_history: Vec<Turn>,
}

/// Session store over a MongoDB collection.
#[derive(Clone)]
pub struct SessionStore {
    users: Collection<SessionRecord>,
}

impl SessionStore {
    /// Connect to MongoDB and bind the user collection.
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        Ok(Self {
            users: client.database(database).collection("user"),
        })
    }

    /// Fetch the session for `id`, lazily creating it with the configured
    /// defaults on first contact.
    pub async fn fetch_or_create(
        &self,
        id: &str,
        default_assistant: &str,
        default_model: &str,
    ) -> Result<SessionRecord> {
        if let Some(existing) = self.users.find_one(doc! { "id": id }).await? {
            debug!("Found existing session: {}", id);
            return Ok(existing);
        }

        debug!("Creating new session: {}", id);
        let record = SessionRecord {
            id: id.to_string(),
            assistant: default_assistant.to_string(),
            model: default_model.to_string(),
            conversation_history: Vec::new(),
        };
        self.users.insert_one(&record).await?;
        Ok(record)
    }

    /// Set the active model key. The key is stored as-is; existence against
    /// the configured model set is checked at use time only.
    pub async fn set_model(&self, id: &str, key: &str) -> Result<()> {
        self.users
            .update_one(doc! { "id": id }, doc! { "$set": { "model": key } })
            .await?;
        Ok(())
    }

    /// Set the active assistant key. Stored as-is, validated at use time.
    pub async fn set_assistant(&self, id: &str, key: &str) -> Result<()> {
        self.users
            .update_one(doc! { "id": id }, doc! { "$set": { "assistant": key } })
            .await?;
        Ok(())
    }

    /// Replace the stored conversation history.
    pub async fn set_history(&self, id: &str, history: &[Turn]) -> Result<()> {
        let turns = mongodb::bson::to_bson(history)?;
        self.users
            .update_one(doc! { "id": id }, doc! { "$set": { "conversation_history": turns } })
            .await?;
        Ok(())
    }
}
