//! Conversation state machine
//!
//! The guarded pipeline behind every conversational turn: resolve the
//! session's model and assistant against the configured catalogue, project
//! the bounded history window, merge the new content in, and describe the
//! completion request to issue. Planning is pure; the handlers own the
//! collaborator calls and persist only after a successful completion, so a
//! failed call leaves stored history untouched.
//!
//! The "awaiting caption" state is implicit in the data shape: an image turn
//! opens a multi-part user entry and defers the completion call until a
//! following text turn supplies the question. `is_awaiting_caption` is the
//! single predicate for that shape.

#[cfg(test)]
#[path = "chat_tests.rs"]
mod chat_tests;

use serde_json::{Map, Value};

use llm_openai::ChatMessage;

use crate::config::{Config, ModelKind};
use crate::session::{ContentPart, Role, SessionRecord, Turn, TurnContent};

/// Fixed reply for a bare image turn, sent while the caption is pending.
pub const IMAGE_PROMPT_REPLY: &str = "Tell me what you want to ask about this photo.";

/// User-facing pipeline rejection. Guards abort a turn without mutating any
/// state and are not errors; the handler sends the reply text and returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    UnknownModel(String),
    UnknownAssistant(String),
    VisionUnsupported(String),
}

impl Guard {
    pub fn reply_text(&self) -> String {
        match self {
            Guard::UnknownModel(key) => format!("model does not exist: {key}"),
            Guard::UnknownAssistant(key) => format!("assistant does not exist: {key}"),
            Guard::VisionUnsupported(key) => format!("model does not support images: {key}"),
        }
    }
}

/// Completion request assembled for a text turn, plus what reconciliation
/// needs to mirror the window edit back onto the stored history.
#[derive(Debug, Clone)]
pub struct TextPlan {
    /// Provider-side model name
    pub model: String,
    /// System instructions of the active assistant
    pub instructions: String,
    /// Opaque per-model request properties
    pub props: Map<String, Value>,
    /// Projected history window with the new user content merged in
    pub window: Vec<Turn>,
    /// How many stored turns the window was projected from
    pub taken: usize,
}

impl TextPlan {
    /// The history window in completion wire form. The system entry is
    /// prepended by the completion client.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.window.iter().map(turn_to_message).collect()
    }
}

/// Transcoding parameters for an accepted image turn.
#[derive(Debug, Clone, Copy)]
pub struct ImagePlan {
    pub max_pixel: u32,
    pub jpeg_quality: u8,
}

/// True when the last stored entry is an unanswered multi-part user turn —
/// an image (or images) still waiting for its caption.
pub fn is_awaiting_caption(last: Option<&Turn>) -> bool {
    matches!(
        last,
        Some(Turn {
            role: Role::User,
            content: TurnContent::Parts(_),
        })
    )
}

/// Plan a text turn.
///
/// Returns `Ok(None)` for non-chat model kinds (reserved; the turn is a
/// no-op and nothing is sent), `Err(Guard)` when the session references a
/// model or assistant that is no longer configured.
pub fn plan_text_turn(
    session: &SessionRecord,
    text: &str,
    config: &Config,
) -> Result<Option<TextPlan>, Guard> {
    let model = config
        .model(&session.model)
        .ok_or_else(|| Guard::UnknownModel(session.model.clone()))?;
    if model.kind != ModelKind::Chat {
        return Ok(None);
    }
    let assistant = config
        .assistant(&session.assistant)
        .ok_or_else(|| Guard::UnknownAssistant(session.assistant.clone()))?;

    let stored = &session.conversation_history;
    let taken = stored.len().min(config.chat.max_history);
    let mut window: Vec<Turn> = stored[stored.len() - taken..].to_vec();
    merge_text_turn(&mut window, text);

    Ok(Some(TextPlan {
        model: model.model.clone(),
        instructions: assistant.instructions.clone(),
        props: model.props.clone(),
        window,
        taken,
    }))
}

/// Plan an image turn. Guard order matters: the model must exist and be a
/// chat model before the vision flag is consulted, and no attachment fetch
/// happens unless planning succeeds.
pub fn plan_image_turn(session: &SessionRecord, config: &Config) -> Result<Option<ImagePlan>, Guard> {
    let model = config
        .model(&session.model)
        .ok_or_else(|| Guard::UnknownModel(session.model.clone()))?;
    if model.kind != ModelKind::Chat {
        return Ok(None);
    }
    if !model.vision {
        return Err(Guard::VisionUnsupported(model.key.clone()));
    }
    Ok(Some(ImagePlan {
        max_pixel: config.chat.max_pixel,
        jpeg_quality: config.chat.jpeg_quality,
    }))
}

/// Merge a text turn into `history`: appended as a text part onto a pending
/// multi-part user turn, otherwise pushed as a new scalar user entry.
pub fn merge_text_turn(history: &mut Vec<Turn>, text: &str) {
    if is_awaiting_caption(history.last()) {
        append_part(history, ContentPart::text(text));
    } else {
        history.push(Turn::user_text(text));
    }
}

/// Merge an image turn into `history`: appended as an image part onto a
/// pending multi-part user turn, otherwise opening a new one. Either way the
/// session is left awaiting a caption; no completion call is planned.
pub fn merge_image_turn(history: &mut Vec<Turn>, data_uri: &str) {
    if is_awaiting_caption(history.last()) {
        append_part(history, ContentPart::image(data_uri));
    } else {
        history.push(Turn::user_parts(vec![ContentPart::image(data_uri)]));
    }
}

fn append_part(history: &mut Vec<Turn>, part: ContentPart) {
    if let Some(Turn {
        content: TurnContent::Parts(parts),
        ..
    }) = history.last_mut()
    {
        parts.push(part);
    }
}

/// Rebuild the full stored history after a successful completion: the
/// untouched prefix, then the projected-and-mutated window, then the
/// assistant reply.
pub fn reconcile_history(stored: &[Turn], window: Vec<Turn>, taken: usize, reply: &str) -> Vec<Turn> {
    let mut next: Vec<Turn> = stored[..stored.len() - taken].to_vec();
    next.extend(window);
    next.push(Turn::assistant_text(reply));
    next
}

fn turn_to_message(turn: &Turn) -> ChatMessage {
    let role = match turn.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    let content = match &turn.content {
        TurnContent::Text(text) => Value::String(text.clone()),
        TurnContent::Parts(parts) => {
            serde_json::to_value(parts).expect("content parts serialize")
        }
    };
    ChatMessage::new(role, content)
}
