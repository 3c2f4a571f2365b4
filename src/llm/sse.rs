//! Server-sent events line splitting.

use futures::{Stream, StreamExt};
use tracing::trace;

use crate::error::TransportError;

/// Terminal payload sent by OpenAI-compatible servers.
pub const DONE: &str = "[DONE]";

/// Extract the payload of an SSE `data:` line.
///
/// Comments, other fields and blank keep-alive lines return `None`.
pub fn extract_sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.is_empty() { None } else { Some(data) }
}

/// Turn a raw byte stream into a stream of `data:` payloads.
///
/// Lines are split on `\n` (a trailing `\r` is dropped) and only decoded once
/// complete, so multibyte characters split across chunks survive. The stream
/// ends after [`DONE`], or at the end of input after flushing a final
/// unterminated line. A read error is yielded once and ends the stream.
pub fn parse_sse_lines<S, B, E>(byte_stream: S) -> impl Stream<Item = Result<String, TransportError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    futures::stream::unfold(
        (byte_stream, Vec::with_capacity(8192), false),
        |(mut stream, mut buffer, done)| async move {
            if done {
                return None;
            }

            loop {
                if let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let mut line_bytes: Vec<u8> = buffer.drain(..=newline_pos).collect();
                    line_bytes.pop();
                    if line_bytes.last() == Some(&b'\r') {
                        line_bytes.pop();
                    }

                    let Ok(line) = std::str::from_utf8(&line_bytes) else {
                        trace!("Skipping non-UTF-8 SSE line");
                        continue;
                    };

                    match extract_sse_data(line) {
                        Some(DONE) => return None,
                        Some(data) => return Some((Ok(data.to_string()), (stream, buffer, false))),
                        None => continue,
                    }
                }

                match stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(chunk.as_ref()),
                    Some(Err(e)) => {
                        let err = TransportError::Stream(e.to_string());
                        return Some((Err(err), (stream, buffer, true)));
                    }
                    None => {
                        let line = std::str::from_utf8(&buffer).ok()?.trim();
                        let data = extract_sse_data(line)?;
                        if data == DONE {
                            return None;
                        }
                        let data = data.to_string();
                        buffer.clear();
                        return Some((Ok(data), (stream, buffer, true)));
                    }
                }
            }
        },
    )
}
