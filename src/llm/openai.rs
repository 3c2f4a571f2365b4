//! OpenAI-compatible chat-completions transport.

use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TransportError;
use crate::prompt::Message;

use super::retry::retry_with_backoff;
use super::sse::parse_sse_lines;
use super::transport::{CompletionRequest, CompletionTransport, TokenStream};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Base URL up to and including the version segment, e.g. `.../v1`.
    pub base_url: String,
    /// Total time allowed for one request, including the streamed body.
    pub timeout: Duration,
}

pub struct OpenAiTransport {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiTransport {
    pub fn new(config: OpenAiConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(TransportError::Request)?;

        Ok(Self {
            client,
            api_key: config.api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Send the request once and check the status.
    async fn send(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response, TransportError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(TransportError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: parse_api_error(&body_text),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionTransport for OpenAiTransport {
    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, TransportError> {
        debug!(
            model = %request.model,
            message_count = request.messages.len(),
            stream = request.stream,
            "Starting completion request"
        );

        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: request.stream,
            temperature: request.temperature,
            stream_options: request.stream.then_some(StreamOptions { include_usage: true }),
        };

        let response = retry_with_backoff(
            || self.send(&body),
            TransportError::is_retryable,
            |e| TransportError::RetriesExhausted(Box::new(e)),
        )
        .await?;

        if !request.stream {
            let reply: ChatResponse = response.json().await.map_err(TransportError::Request)?;
            log_usage(reply.usage.as_ref());
            let content = reply
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| TransportError::InvalidResponse("no choices in reply".to_string()))?;
            return Ok(Box::pin(stream::once(async move { Ok(content) })));
        }

        let tokens = parse_sse_lines(response.bytes_stream()).filter_map(|item| {
            let piece = match item {
                Ok(data) => parse_chunk(&data),
                Err(e) => Some(Err(e)),
            };
            std::future::ready(piece)
        });

        Ok(Box::pin(tokens))
    }
}

/// Turn one SSE payload into a content delta, if it carries one.
fn parse_chunk(data: &str) -> Option<Result<String, TransportError>> {
    let chunk: ChatChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            return Some(Err(TransportError::InvalidResponse(format!(
                "malformed stream chunk ({e}): {data}"
            ))));
        }
    };

    if let Some(error) = chunk.error {
        return Some(Err(TransportError::Stream(error.message)));
    }
    log_usage(chunk.usage.as_ref());

    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|content| !content.is_empty())
        .map(Ok)
}

fn log_usage(usage: Option<&Usage>) {
    if let Some(usage) = usage {
        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Completion usage"
        );
    }
}

/// Pull the human-readable message out of an API error body.
fn parse_api_error(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ResponseChoice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    usage: Option<Usage>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}
