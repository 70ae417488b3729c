//! Slash-command parsing and dispatch
//!
//! A command line is `/<name>` optionally followed by whitespace and a
//! free-form remainder. Everything else is plain conversational text.
//! Dispatch distinguishes three outcomes: handled, not-a-command (falls
//! through to the conversation path) and unknown-command (gets its own
//! user-visible reply).

#[cfg(test)]
#[path = "commands_tests.rs"]
mod commands_tests;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use anyhow::Result;
use regex::Regex;

static COMMAND_RE: OnceLock<Regex> = OnceLock::new();

fn command_re() -> &'static Regex {
    COMMAND_RE.get_or_init(|| Regex::new(r"^/(\S+)(?:\s+(.+))?$").expect("command regex compiles"))
}

/// Parse result for one line of inbound text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<'a> {
    /// `/<name>`, with everything after the first whitespace run as remainder
    Command {
        name: &'a str,
        remainder: Option<&'a str>,
    },
    /// Not shaped like a command; forward to the conversation path
    PlainText,
}

/// Classify a raw text line. Pure; no side effects.
pub fn parse_line(text: &str) -> Parsed<'_> {
    let text = text.trim();
    match command_re().captures(text) {
        Some(caps) => Parsed::Command {
            name: caps.get(1).map(|m| m.as_str()).unwrap_or_default(),
            remainder: caps.get(2).map(|m| m.as_str()),
        },
        None => Parsed::PlainText,
    }
}

/// Dispatch outcome. The caller replies "unknown command" only on
/// `UnknownCommand` and silently falls through to conversation handling
/// only on `NotACommand`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    NotACommand,
    UnknownCommand,
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// A registered command handler: receives the remainder and a caller-chosen
/// context value.
pub type Handler<C> = Arc<dyn Fn(Option<String>, C) -> HandlerFuture + Send + Sync>;

/// Wrap an `async fn(Option<String>, C) -> Result<()>` as a [`Handler`].
pub fn handler<C, F, Fut>(f: F) -> Handler<C>
where
    F: Fn(Option<String>, C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |remainder, ctx| -> HandlerFuture { Box::pin(f(remainder, ctx)) })
}

/// Builder collecting `(name, handler)` pairs at startup.
pub struct RegistryBuilder<C> {
    handlers: HashMap<String, Handler<C>>,
}

impl<C> RegistryBuilder<C> {
    pub fn register(mut self, name: &str, handler: Handler<C>) -> Self {
        self.handlers.insert(name.to_string(), handler);
        self
    }

    pub fn build(self) -> CommandRegistry<C> {
        CommandRegistry {
            handlers: self.handlers,
        }
    }
}

/// Immutable command lookup built once at startup.
pub struct CommandRegistry<C> {
    handlers: HashMap<String, Handler<C>>,
}

impl<C> CommandRegistry<C> {
    pub fn builder() -> RegistryBuilder<C> {
        RegistryBuilder {
            handlers: HashMap::new(),
        }
    }

    /// Parse `text` and run the matching handler, if any. Handler errors
    /// propagate; the three-way outcome is reserved for routing.
    pub async fn dispatch(&self, text: &str, ctx: C) -> Result<Dispatch> {
        match parse_line(text) {
            Parsed::PlainText => Ok(Dispatch::NotACommand),
            Parsed::Command { name, remainder } => match self.handlers.get(name) {
                None => Ok(Dispatch::UnknownCommand),
                Some(handler) => {
                    handler(remainder.map(str::to_string), ctx).await?;
                    Ok(Dispatch::Handled)
                }
            },
        }
    }
}
