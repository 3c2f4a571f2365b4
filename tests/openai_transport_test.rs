//! Integration tests for the OpenAI-compatible transport against a mock server.

use std::time::Duration;

use futures::StreamExt;
use lazycommit::error::TransportError;
use lazycommit::llm::{
    CompletionRequest, CompletionTransport, OpenAiConfig, OpenAiTransport, generate_message,
};
use lazycommit::prompt::Message;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(server: &MockServer) -> OpenAiTransport {
    OpenAiTransport::new(OpenAiConfig {
        api_key: "sk-test".to_string(),
        base_url: format!("{}/v1", server.uri()),
        timeout: Duration::from_secs(10),
    })
    .expect("Failed to build transport")
}

fn request() -> CompletionRequest {
    CompletionRequest::new(
        "gpt-4o-2024-08-06",
        vec![Message::system("Write a commit message."), Message::user("diff --git a/x b/x\n")],
    )
}

fn sse_body(pieces: &[&str]) -> String {
    let mut body = String::new();
    body.push_str(": keep-alive\n\n");
    body.push_str("data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n");
    for piece in pieces {
        let chunk = json!({"choices": [{"index": 0, "delta": {"content": piece}}]});
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    body.push_str(
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":42,\"completion_tokens\":7,\"total_tokens\":49}}\n\n",
    );
    body.push_str("data: [DONE]\n\n");
    body
}

async fn collect_pieces(
    transport: &OpenAiTransport,
    request: CompletionRequest,
) -> Result<Vec<String>, TransportError> {
    let stream = transport.stream(request).await?;
    stream.collect::<Vec<_>>().await.into_iter().collect()
}

// =============================================================================
// STREAMING
// =============================================================================

#[tokio::test]
async fn test_streamed_pieces_arrive_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-2024-08-06",
            "stream": true,
            "temperature": 0.0,
            "stream_options": {"include_usage": true}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body(&["feat(git): ", "collect renames", "\n"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let pieces = collect_pieces(&transport(&server), request()).await.unwrap();
    assert_eq!(pieces, vec!["feat(git): ", "collect renames", "\n"]);
}

#[tokio::test]
async fn test_generate_message_over_stream() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body(&["```\n", "fix: handle ", "unborn HEAD\n", "```"])),
        )
        .mount(&server)
        .await;

    let mut echoed = String::new();
    let message = generate_message(&transport(&server), request(), |piece| echoed.push_str(piece))
        .await
        .unwrap();

    assert_eq!(message, "fix: handle unborn HEAD");
    assert_eq!(echoed, "```\nfix: handle unborn HEAD\n```");
}

#[tokio::test]
async fn test_error_event_in_stream() {
    let server = MockServer::start().await;

    let body = "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"feat\"}}]}\n\n\
                data: {\"error\":{\"message\":\"The server had an error\"}}\n\n";
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let err = collect_pieces(&transport(&server), request()).await.unwrap_err();
    assert!(matches!(err, TransportError::Stream(m) if m == "The server had an error"));
}

// =============================================================================
// NON-STREAMING
// =============================================================================

#[tokio::test]
async fn test_non_streaming_reply_yielded_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "docs: describe budget flag"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 50, "completion_tokens": 6, "total_tokens": 56}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let pieces = collect_pieces(&transport(&server), request().with_stream(false))
        .await
        .unwrap();
    assert_eq!(pieces, vec!["docs: describe budget flag"]);
}

#[tokio::test]
async fn test_non_streaming_reply_without_choices() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let result = transport(&server).stream(request().with_stream(false)).await;
    assert!(matches!(result, Err(TransportError::InvalidResponse(_))));
}

// =============================================================================
// ERRORS AND RETRIES
// =============================================================================

#[tokio::test]
async fn test_unauthorized_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = transport(&server).stream(request()).await;
    match result {
        Err(TransportError::Status { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "Incorrect API key provided");
        }
        other => panic!("expected 401 status error, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn test_server_errors_retried_until_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .expect(3)
        .mount(&server)
        .await;

    let result = transport(&server).stream(request()).await;
    match result {
        Err(TransportError::RetriesExhausted(inner)) => {
            assert!(matches!(*inner, TransportError::Status { status: 503, .. }));
        }
        other => panic!("expected exhausted retries, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn test_rate_limit_recovers_on_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body(&["chore: retry"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let pieces = collect_pieces(&transport(&server), request()).await.unwrap();
    assert_eq!(pieces, vec!["chore: retry"]);
}
