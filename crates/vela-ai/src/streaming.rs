//! Server-Sent Events (SSE) streaming parser.
//!
//! Both backend providers stream token deltas over SSE. [`sse_stream`]
//! wraps a reqwest response as an async sequence of events; providers
//! decode the per-event JSON themselves.

use futures_util::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio_util::io::StreamReader;

use crate::AiError;

/// A single SSE event parsed from the stream.
#[derive(Debug, Clone)]
pub struct SseEvent {
    /// The event type (e.g. "content_block_delta"); chat-completions
    /// streams leave it unset.
    pub event: Option<String>,
    /// The event data (JSON string, or a sentinel like "[DONE]").
    pub data: String,
}

/// Incremental SSE reader over a response body.
pub struct SseStream<R> {
    lines: Lines<R>,
    done: bool,
}

/// Wrap a streaming response for event-by-event reading.
pub fn sse_stream(response: reqwest::Response) -> SseStream<impl AsyncBufRead + Unpin> {
    let byte_stream = response
        .bytes_stream()
        .map(|result| result.map_err(std::io::Error::other));
    let reader = BufReader::new(StreamReader::new(byte_stream));
    SseStream {
        lines: reader.lines(),
        done: false,
    }
}

impl<R: AsyncBufRead + Unpin> SseStream<R> {
    /// Next complete event, or `None` when the stream ends.
    pub async fn next_event(&mut self) -> Result<Option<SseEvent>, AiError> {
        if self.done {
            return Ok(None);
        }

        let mut current_event: Option<String> = None;
        let mut current_data = String::new();

        while let Some(line) = self
            .lines
            .next_line()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?
        {
            if line.is_empty() {
                // Empty line = end of event
                if !current_data.is_empty() {
                    return Ok(Some(SseEvent {
                        event: current_event,
                        data: current_data,
                    }));
                }
                current_event = None;
                continue;
            }

            if let Some(event_type) = line.strip_prefix("event: ") {
                current_event = Some(event_type.to_string());
            } else if let Some(data) = line.strip_prefix("data: ") {
                if !current_data.is_empty() {
                    current_data.push('\n');
                }
                current_data.push_str(data);
            }
            // Ignore other fields (id:, retry:, comments)
        }

        self.done = true;

        // Flush a trailing event that had no terminating blank line
        if !current_data.is_empty() {
            return Ok(Some(SseEvent {
                event: current_event,
                data: current_data,
            }));
        }
        Ok(None)
    }
}
