//! The seam between prompt compilation and a chat-completion service.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::TransportError;
use crate::prompt::Message;

/// Incremental pieces of the model's reply, in order.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// One chat-completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            temperature: 0.0,
        }
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// A chat-completion backend.
///
/// Non-streaming backends yield the whole reply as a single item.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, TransportError>;
}
