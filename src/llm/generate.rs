//! Drive a completion request to a finished commit message.

use std::io::Write;

use anyhow::{Context, Result};
use colored::Colorize;
use futures::StreamExt;
use tracing::debug;

use super::response::clean_message;
use super::transport::{CompletionRequest, CompletionTransport};

/// Run `request` and return the cleaned commit message.
///
/// `on_token` sees every piece of the raw reply as it arrives, so callers can
/// echo the message while it is being written.
pub async fn generate_message<F>(
    transport: &dyn CompletionTransport,
    request: CompletionRequest,
    mut on_token: F,
) -> Result<String>
where
    F: FnMut(&str),
{
    let mut tokens = transport
        .stream(request)
        .await
        .context("Failed to start completion")?;

    let mut reply = String::new();
    while let Some(piece) = tokens.next().await {
        let piece = piece.context("Completion stream interrupted")?;
        on_token(&piece);
        reply.push_str(&piece);
    }
    debug!("Received {} bytes of reply", reply.len());

    Ok(clean_message(&reply)?)
}

/// Echoes reply pieces to a terminal as they stream in.
///
/// A failed write never aborts generation. The first error is logged and
/// echoing stops; the message is still returned in full.
pub struct Echo<W: Write> {
    out: W,
    failed: bool,
}

impl<W: Write> Echo<W> {
    pub fn new(out: W) -> Self {
        Self { out, failed: false }
    }

    pub fn write(&mut self, piece: &str) {
        if self.failed {
            return;
        }
        let result = write!(self.out, "{}", piece.cyan()).and_then(|()| self.out.flush());
        if let Err(e) = result {
            debug!("Stopped echoing reply: {}", e);
            self.failed = true;
        }
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }
}
