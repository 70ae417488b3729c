//! LINE ⇄ LLM webhook bridge
//!
//! Receives chat events from the LINE platform, keeps per-user session
//! state (active model, active assistant, conversation history) in MongoDB,
//! forwards conversational turns to an OpenAI-compatible completion API and
//! relays the reply. A small slash-command router covers user-initiated
//! actions (switch model, switch assistant, reset session, profile, help).

mod chat;
mod client;
mod commands;
mod config;
mod dedup;
mod handlers;
mod health;
mod media;
mod session;
mod webhook;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::client::LineClient;
use crate::config::Config;
use crate::dedup::DedupStore;
use crate::handlers::AppContext;
use crate::session::SessionStore;

/// Capacity of the in-memory webhook event dedup set.
const DEDUP_CAPACITY: usize = 1024;

/// LINE Bot Bridge CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/line-bot.toml")]
    config: String,

    /// Listen port (overrides config file)
    #[arg(long, env = "LINE_BOT_PORT")]
    port: Option<u16>,

    /// MongoDB connection string (overrides config file)
    #[arg(long, env = "MONGO_URI")]
    mongo_uri: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "line_bot=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting LINE bot bridge");

    let args = Args::parse();

    let mut config = Config::from_file(&args.config)?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(mongo_uri) = args.mongo_uri {
        config.store.mongo_uri = mongo_uri;
    }
    config.validate()?;

    info!(
        "Configuration loaded: {} model(s), {} assistant(s), max_history {}",
        config.models.len(),
        config.assistants.len(),
        config.chat.max_history
    );

    info!("Connecting to MongoDB...");
    let store = SessionStore::connect(&config.store.mongo_uri, &config.store.database).await?;
    info!("Connected to MongoDB");

    let line = LineClient::new(config.line.channel_access_token.clone());
    let llm = llm_openai::CompletionClient::new(
        config.openai.api_key.clone(),
        config.openai.base_url.clone(),
    );

    let health_state = health::AppState::new();
    *health_state.store_connected.write().await = true;

    let ctx = AppContext {
        config: Arc::new(config),
        store,
        line,
        llm,
        registry: Arc::new(handlers::build_registry()),
        health: health_state.clone(),
        dedup: DedupStore::new(DEDUP_CAPACITY),
    };

    let app = webhook::router(ctx.clone()).merge(health::create_health_router(health_state));

    let addr = format!("{}:{}", ctx.config.server.bind_address, ctx.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Webhook server listening on {}", addr);

    axum::serve(listener, app).await?;

    info!("LINE bot bridge stopped");
    Ok(())
}
