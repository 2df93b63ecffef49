//! Channel abstraction for planning I/O.
//!
//! A channel yields lines typed by the user and displays the assistant's
//! replies. `run_session` drives a `PlanManager` from any channel.

pub mod cli;

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use crate::error::{ChannelError, Error};
use crate::planning::{DialogTurn, ManagerReply, PlanManager, Speaker};

pub use cli::CliChannel;

/// A line of user input received by a channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub content: String,
}

impl IncomingMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Stream of incoming messages. Ends when the user closes the channel; an
/// `Err` item means input broke off mid-session.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<IncomingMessage, ChannelError>> + Send>>;

#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Start receiving user input.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Display one assistant message.
    async fn respond(&self, content: &str) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

/// Why a session loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user asked to quit, or the channel closed.
    Quit,
    /// The user asked to switch to expense tracking.
    LeftPlanning,
}

/// Drive `manager` from `channel` until the user quits or leaves planning.
///
/// The transcript so far is replayed first so a resumed session shows the
/// pending question. A channel that disconnects ends the session with its
/// error.
pub async fn run_session(
    manager: &PlanManager,
    channel: &dyn Channel,
) -> Result<SessionEnd, Error> {
    let mut messages = channel.start().await?;

    let known = manager.status().await.attributes;
    if !known.is_empty() {
        channel.respond(known.describe().trim_end()).await?;
    }
    respond_turns(channel, &manager.transcript().await).await?;

    while let Some(msg) = messages.next().await {
        let msg = msg?;
        let reply = match manager.handle_input(&msg.content).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(channel = channel.name(), error = %e, "Planning input failed");
                // The engine already explained plan failures in its transcript.
                let text = match &e {
                    Error::Plan(_) => manager.transcript().await.last().map(|t| t.text.clone()),
                    _ => None,
                };
                let text = text.unwrap_or_else(|| format!("Sorry, that didn't work: {e}"));
                channel.respond(&text).await?;
                continue;
            }
        };

        match reply {
            ManagerReply::Replied { turns, .. } | ManagerReply::Restarted { turns } => {
                respond_turns(channel, &turns).await?;
            }
            ManagerReply::Exported { budget } => {
                channel
                    .respond(&format!(
                        "Exported a monthly budget of ${:.2} across {} categories.",
                        budget.monthly_budget,
                        budget.categories.len()
                    ))
                    .await?;
            }
            ManagerReply::LeftPlanning => {
                channel.shutdown().await?;
                return Ok(SessionEnd::LeftPlanning);
            }
            ManagerReply::Quit => break,
        }
    }

    channel.shutdown().await?;
    Ok(SessionEnd::Quit)
}

async fn respond_turns(channel: &dyn Channel, turns: &[DialogTurn]) -> Result<(), ChannelError> {
    for turn in turns.iter().filter(|t| t.speaker == Speaker::Assistant) {
        channel.respond(&turn.text).await?;
    }
    Ok(())
}
