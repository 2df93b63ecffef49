//! CLI channel: stdin/stdout REPL.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, IncomingMessage, MessageStream};
use crate::error::ChannelError;

/// Reads answers line by line from stdin. Prompts go to stderr so stdout
/// carries only the assistant's messages.
#[derive(Debug, Default)]
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let name = self.name().to_string();

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        if tx.send(Ok(IncomingMessage::new(line))).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(channel = %name, error = %e, "Reading stdin failed");
                        let _ = tx.send(Err(ChannelError::Disconnected {
                            name,
                            reason: e.to_string(),
                        }));
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(&self, content: &str) -> Result<(), ChannelError> {
        println!("\n{content}\n");
        eprint!("> ");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        eprintln!();
        Ok(())
    }
}
