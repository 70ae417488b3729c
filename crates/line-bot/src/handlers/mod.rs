//! Event routing and action handlers
//!
//! Classifies inbound webhook events (postback vs. message, text vs. image)
//! and runs the matching action: slash commands, model/assistant selection,
//! or a conversational turn through the state machine in [`crate::chat`].

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use line_types::{
    Action, CarouselColumn, Event, MessageContent, MessageEvent, OutboundMessage, PostbackEvent,
    WebhookDelivery,
};

use crate::chat;
use crate::client::LineClient;
use crate::commands::{handler, CommandRegistry, Dispatch};
use crate::config::{AssistantEntry, Config, ModelEntry};
use crate::dedup::DedupStore;
use crate::health::AppState;
use crate::media;
use crate::session::SessionStore;

const UNKNOWN_COMMAND_REPLY: &str = "unknown command";
const UNKNOWN_ACTION_REPLY: &str = "unknown action";

/// Shared per-process context, passed explicitly into every handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub store: SessionStore,
    pub line: LineClient,
    pub llm: llm_openai::CompletionClient,
    pub registry: Arc<CommandRegistry<CommandContext>>,
    pub health: AppState,
    pub dedup: DedupStore,
}

/// Per-event context handed to command handlers.
#[derive(Clone)]
pub struct CommandContext {
    pub app: AppContext,
    pub reply_token: String,
    pub user_id: String,
}

/// Process one webhook delivery: every event, strictly in order.
pub async fn handle_delivery(delivery: WebhookDelivery, ctx: &AppContext) -> Result<()> {
    for event in delivery.events {
        match event {
            Event::Message(ev) => handle_message_event(ev, ctx).await?,
            Event::Postback(ev) => handle_postback_event(ev, ctx).await?,
            Event::Unsupported => debug!("Ignoring unsupported event type"),
        }
    }
    Ok(())
}

async fn handle_message_event(ev: MessageEvent, ctx: &AppContext) -> Result<()> {
    let Some(user_id) = ev.source.user_id.clone() else {
        debug!("Ignoring message event without a user source");
        return Ok(());
    };
    if !ctx.config.access.permits(&user_id) {
        warn!("Access denied for user {}", user_id);
        return Ok(());
    }
    if let Some(event_id) = ev.webhook_event_id.as_deref() {
        if ctx.dedup.is_duplicate(event_id) {
            return Ok(());
        }
    }
    ctx.health.increment_events_received().await;

    match &ev.message {
        MessageContent::Text { text, .. } => {
            handle_text(&ev.reply_token, &user_id, text, ctx).await?
        }
        MessageContent::Image { id } => {
            handle_image(&ev.reply_token, &user_id, id, ctx).await?
        }
        MessageContent::Unsupported => {
            debug!("Ignoring unsupported message kind");
        }
    }

    if let Some(event_id) = ev.webhook_event_id.as_deref() {
        ctx.dedup.mark_seen(event_id);
    }
    Ok(())
}

async fn handle_text(reply_token: &str, user_id: &str, text: &str, ctx: &AppContext) -> Result<()> {
    let profile = ctx.line.profile(user_id).await?;
    info!("Message from {} ({})", profile.display_name, profile.user_id);

    let cmd_ctx = CommandContext {
        app: ctx.clone(),
        reply_token: reply_token.to_string(),
        user_id: user_id.to_string(),
    };
    match ctx.registry.dispatch(text, cmd_ctx).await? {
        Dispatch::Handled => {
            ctx.health.increment_commands().await;
            Ok(())
        }
        Dispatch::UnknownCommand => {
            reply_text(ctx, reply_token, UNKNOWN_COMMAND_REPLY).await
        }
        Dispatch::NotACommand => chat_text_turn(reply_token, user_id, text, ctx).await,
    }
}

/// A conversational text turn: plan, complete, reply, persist. Persistence
/// happens only after a successful completion call.
async fn chat_text_turn(reply_token: &str, user_id: &str, text: &str, ctx: &AppContext) -> Result<()> {
    let config = &ctx.config;
    let session = ctx
        .store
        .fetch_or_create(user_id, config.default_assistant_key(), config.default_model_key())
        .await?;

    let plan = match chat::plan_text_turn(&session, text, config) {
        Err(guard) => return reply_text(ctx, reply_token, &guard.reply_text()).await,
        Ok(None) => return Ok(()),
        Ok(Some(plan)) => plan,
    };

    let reply = ctx
        .llm
        .complete(&plan.model, &plan.instructions, plan.messages(), &plan.props)
        .await?;
    ctx.health.increment_completions().await;

    let history = chat::reconcile_history(&session.conversation_history, plan.window, plan.taken, &reply);
    reply_text(ctx, reply_token, &reply).await?;
    ctx.store.set_history(user_id, &history).await?;
    Ok(())
}

/// An image turn: guard, fetch, transcode off the async runtime, merge into
/// the stored history, persist, and prompt for the caption. No completion
/// call happens until the caption arrives.
async fn handle_image(reply_token: &str, user_id: &str, message_id: &str, ctx: &AppContext) -> Result<()> {
    let config = &ctx.config;
    let session = ctx
        .store
        .fetch_or_create(user_id, config.default_assistant_key(), config.default_model_key())
        .await?;

    let plan = match chat::plan_image_turn(&session, config) {
        Err(guard) => return reply_text(ctx, reply_token, &guard.reply_text()).await,
        Ok(None) => return Ok(()),
        Ok(Some(plan)) => plan,
    };

    let bytes = ctx.line.content(message_id).await?;
    let data_uri = media::to_jpeg_data_uri(bytes, plan.max_pixel, plan.jpeg_quality).await?;

    let mut history = session.conversation_history;
    chat::merge_image_turn(&mut history, &data_uri);
    ctx.store.set_history(user_id, &history).await?;
    reply_text(ctx, reply_token, chat::IMAGE_PROMPT_REPLY).await
}

async fn handle_postback_event(ev: PostbackEvent, ctx: &AppContext) -> Result<()> {
    let Some(user_id) = ev.source.user_id.clone() else {
        debug!("Ignoring postback event without a user source");
        return Ok(());
    };
    if !ctx.config.access.permits(&user_id) {
        warn!("Access denied for user {}", user_id);
        return Ok(());
    }
    if let Some(event_id) = ev.webhook_event_id.as_deref() {
        if ctx.dedup.is_duplicate(event_id) {
            return Ok(());
        }
    }
    ctx.health.increment_events_received().await;

    let data = parse_postback_data(&ev.postback.data);
    match data.get("action").map(String::as_str) {
        Some("select_model") => match data.get("model") {
            Some(key) => select_model(&ev.reply_token, &user_id, key, ctx).await?,
            None => reply_text(ctx, &ev.reply_token, UNKNOWN_ACTION_REPLY).await?,
        },
        Some("select_assistant") => match data.get("assistant") {
            Some(key) => select_assistant(&ev.reply_token, &user_id, key, ctx).await?,
            None => reply_text(ctx, &ev.reply_token, UNKNOWN_ACTION_REPLY).await?,
        },
        _ => reply_text(ctx, &ev.reply_token, UNKNOWN_ACTION_REPLY).await?,
    }

    if let Some(event_id) = ev.webhook_event_id.as_deref() {
        ctx.dedup.mark_seen(event_id);
    }
    Ok(())
}

/// Store the selected model key as-is; existence against the configured set
/// is checked at use time only.
async fn select_model(reply_token: &str, user_id: &str, key: &str, ctx: &AppContext) -> Result<()> {
    let config = &ctx.config;
    ctx.store
        .fetch_or_create(user_id, config.default_assistant_key(), config.default_model_key())
        .await?;
    ctx.store.set_model(user_id, key).await?;
    reply_text(ctx, reply_token, &format!("model selected: {key}")).await
}

/// Same pattern as [`select_model`] for the assistant key.
async fn select_assistant(reply_token: &str, user_id: &str, key: &str, ctx: &AppContext) -> Result<()> {
    let config = &ctx.config;
    ctx.store
        .fetch_or_create(user_id, config.default_assistant_key(), config.default_model_key())
        .await?;
    ctx.store.set_assistant(user_id, key).await?;
    reply_text(ctx, reply_token, &format!("assistant selected: {key}")).await
}

async fn reply_text(ctx: &AppContext, reply_token: &str, text: &str) -> Result<()> {
    ctx.line
        .reply(reply_token, &[OutboundMessage::text(text)])
        .await?;
    ctx.health.increment_replies_sent().await;
    Ok(())
}

// ── Slash commands ────────────────────────────────────────────────────────────

/// Build the immutable command registry. Registration happens here, once,
/// at startup.
pub fn build_registry() -> CommandRegistry<CommandContext> {
    CommandRegistry::builder()
        .register("me", handler(cmd_me))
        .register("model", handler(cmd_model))
        .register("assistant", handler(cmd_assistant))
        .register("new", handler(cmd_new))
        .register("help", handler(cmd_help))
        .build()
}

async fn cmd_me(_remainder: Option<String>, ctx: CommandContext) -> Result<()> {
    let profile = ctx.app.line.profile(&ctx.user_id).await?;
    reply_text(
        &ctx.app,
        &ctx.reply_token,
        &format!("name: {}\nid: {}", profile.display_name, profile.user_id),
    )
    .await
}

async fn cmd_model(_remainder: Option<String>, ctx: CommandContext) -> Result<()> {
    let config = &ctx.app.config;
    let session = ctx
        .app
        .store
        .fetch_or_create(&ctx.user_id, config.default_assistant_key(), config.default_model_key())
        .await?;

    let columns = model_columns(&config.models, &session.model);
    ctx.app
        .line
        .reply(&ctx.reply_token, &[OutboundMessage::carousel("Select a model.", columns)])
        .await?;
    ctx.app.health.increment_replies_sent().await;
    Ok(())
}

async fn cmd_assistant(_remainder: Option<String>, ctx: CommandContext) -> Result<()> {
    let config = &ctx.app.config;
    let session = ctx
        .app
        .store
        .fetch_or_create(&ctx.user_id, config.default_assistant_key(), config.default_model_key())
        .await?;

    let columns = assistant_columns(&config.assistants, &session.assistant);
    ctx.app
        .line
        .reply(&ctx.reply_token, &[OutboundMessage::carousel("Select an assistant.", columns)])
        .await?;
    ctx.app.health.increment_replies_sent().await;
    Ok(())
}

async fn cmd_new(_remainder: Option<String>, ctx: CommandContext) -> Result<()> {
    let config = &ctx.app.config;
    ctx.app
        .store
        .fetch_or_create(&ctx.user_id, config.default_assistant_key(), config.default_model_key())
        .await?;
    ctx.app.store.set_history(&ctx.user_id, &[]).await?;
    reply_text(&ctx.app, &ctx.reply_token, "session cleared").await
}

async fn cmd_help(_remainder: Option<String>, ctx: CommandContext) -> Result<()> {
    reply_text(&ctx.app, &ctx.reply_token, HELP_TEXT).await
}

const HELP_TEXT: &str = "/new: clear the session\n\
                         /model: select a model\n\
                         /assistant: select an assistant\n\
                         /me: show your profile\n\
                         /help: show this help";

// ── Pure helpers ──────────────────────────────────────────────────────────────

/// Parse a postback data string (form-urlencoded key/value pairs).
pub fn parse_postback_data(data: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(data.as_bytes())
        .into_owned()
        .collect()
}

fn postback_data(action: &str, param: &str, key: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("action", action)
        .append_pair(param, key)
        .finish()
}

/// Carousel columns for the model picker; the active model is marked.
fn model_columns(models: &[ModelEntry], active_key: &str) -> Vec<CarouselColumn> {
    models
        .iter()
        .map(|entry| {
            let marker = if entry.key == active_key { "** " } else { "" };
            CarouselColumn {
                text: format!(
                    "{marker}model: {}\nintelligence: {}\nspeed: {}\npricing: in {} / out {}",
                    entry.model, entry.intelligence, entry.speed, entry.pricing.input, entry.pricing.output
                ),
                actions: vec![Action::postback(
                    "Select",
                    postback_data("select_model", "model", &entry.key),
                )],
            }
        })
        .collect()
}

/// Carousel columns for the assistant picker; the active assistant is marked.
fn assistant_columns(assistants: &[AssistantEntry], active_key: &str) -> Vec<CarouselColumn> {
    assistants
        .iter()
        .map(|entry| {
            let marker = if entry.key == active_key { "** " } else { "" };
            CarouselColumn {
                text: format!("{marker}{}: {}", entry.key, entry.description),
                actions: vec![Action::postback(
                    "Select",
                    postback_data("select_assistant", "assistant", &entry.key),
                )],
            }
        })
        .collect()
}
