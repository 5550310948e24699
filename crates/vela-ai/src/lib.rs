//! Generation gateway.
//!
//! Chooses a backend tier per request with a rule-based complexity
//! classifier and streams generated chunks through a cancellable,
//! one-shot [`ChunkStream`]. Backends implement [`GenBackend`]; two HTTP
//! providers ship here (OpenAI-style chat completions and the Anthropic
//! Messages API), both streaming over SSE.

pub mod anthropic;
pub mod chat;
pub mod gateway;
pub mod prompt;
pub mod select;
pub mod streaming;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use anthropic::{AnthropicBackend, AnthropicConfig};
pub use chat::{ChatBackend, ChatConfig};
pub use gateway::{Gateway, GenerationRequest};
pub use prompt::{Prompt, PromptBuilder};
pub use select::{BackendSelector, Tier};

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("rate limited")]
    RateLimited,

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("stream stalled")]
    Stalled,
}

/// A finite, one-shot sequence of generated chunks.
///
/// The caller must either drain it to completion or call
/// [`ChunkStream::cancel`], which aborts the upstream producer and waits
/// out the grace period for it to release resources.
#[derive(Debug)]
pub struct ChunkStream {
    rx: mpsc::Receiver<Result<String, AiError>>,
    producer: JoinHandle<()>,
}

/// Buffered chunks between producer and consumer; small so backpressure
/// reaches the HTTP stream quickly.
const CHUNK_BUFFER: usize = 32;

impl ChunkStream {
    /// Spawn a producer task feeding the stream. The producer's sender
    /// closing (or erroring) ends the sequence.
    pub fn spawn<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(mpsc::Sender<Result<String, AiError>>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
        let handle = tokio::spawn(producer(tx));
        Self {
            rx,
            producer: handle,
        }
    }

    /// Next chunk in generation order; `None` once the sequence is done.
    pub async fn next_chunk(&mut self) -> Option<Result<String, AiError>> {
        self.rx.recv().await
    }

    /// Stop upstream production. Returns once the producer has finished
    /// or the grace period expires.
    pub async fn cancel(self, grace: Duration) {
        self.producer.abort();
        let _ = tokio::time::timeout(grace, self.producer).await;
        // Receiver drops here; any buffered chunks are discarded.
    }

    /// Whether the producer has already finished on its own.
    pub fn is_finished(&self) -> bool {
        self.producer.is_finished()
    }
}

/// A generation backend that can stream a reply for a prompt.
#[async_trait]
pub trait GenBackend: Send + Sync {
    /// Stable identifier used in logs and request records.
    fn id(&self) -> &str;

    async fn generate(&self, prompt: &Prompt) -> Result<ChunkStream, AiError>;
}
