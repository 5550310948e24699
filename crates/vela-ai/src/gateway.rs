//! The gateway owning the backend tiers.
//!
//! Exactly one [`GenerationRequest`] exists per turn that reaches
//! generation. The gateway resolves its tier to a backend and starts the
//! chunk stream, retrying a failed start once. Mid-stream failures are
//! the session's to handle and are never retried here.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};
use vela_common::new_correlation_id;

use crate::select::{BackendSelector, Tier};
use crate::{AiError, ChunkStream, GenBackend, Prompt};

/// A single request to produce a streamed reply.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub correlation_id: String,
    pub tier: Tier,
    pub backend_id: String,
    pub prompt: Prompt,
}

pub struct Gateway {
    backends: HashMap<Tier, Arc<dyn GenBackend>>,
    selector: BackendSelector,
}

impl Gateway {
    pub fn new(
        conversational: Arc<dyn GenBackend>,
        reasoning: Arc<dyn GenBackend>,
        selector: BackendSelector,
    ) -> Self {
        let mut backends: HashMap<Tier, Arc<dyn GenBackend>> = HashMap::new();
        backends.insert(Tier::Conversational, conversational);
        backends.insert(Tier::Reasoning, reasoning);
        Self { backends, selector }
    }

    /// Compose the one request for a turn: classify complexity, pick the
    /// tier, and record the resolved backend id.
    pub fn compose(
        &self,
        prompt: Prompt,
        intent_label: &str,
        has_tool_results: bool,
        input_chars: usize,
    ) -> GenerationRequest {
        let tier = self.selector.select(intent_label, has_tool_results, input_chars);
        let backend_id = self.backends[&tier].id().to_string();
        debug!(intent = intent_label, has_tool_results, ?tier, backend = %backend_id, "backend selected");
        GenerationRequest {
            correlation_id: new_correlation_id(),
            tier,
            backend_id,
            prompt,
        }
    }

    /// Start streaming for a request. A failed start is retried once;
    /// a second failure is returned to the caller.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<ChunkStream, AiError> {
        let backend = &self.backends[&request.tier];

        match backend.generate(&request.prompt).await {
            Ok(stream) => Ok(stream),
            Err(first) => {
                warn!(
                    correlation_id = %request.correlation_id,
                    backend = %backend.id(),
                    "generation start failed, retrying once: {first}"
                );
                backend.generate(&request.prompt).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedBackend {
        id: &'static str,
        chunks: Vec<&'static str>,
        fail_first: AtomicUsize,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn ok(id: &'static str, chunks: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                id,
                chunks,
                fail_first: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing_first(id: &'static str, failures: usize) -> Arc<Self> {
            Arc::new(Self {
                id,
                chunks: vec!["ok"],
                fail_first: AtomicUsize::new(failures),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl GenBackend for ScriptedBackend {
        fn id(&self) -> &str {
            self.id
        }

        async fn generate(&self, _: &Prompt) -> Result<ChunkStream, AiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(AiError::Unavailable("scripted outage".into()));
            }
            let chunks = self.chunks.clone();
            Ok(ChunkStream::spawn(move |tx| async move {
                for chunk in chunks {
                    if tx.send(Ok(chunk.to_string())).await.is_err() {
                        break;
                    }
                }
            }))
        }
    }

    fn gateway(conv: Arc<ScriptedBackend>, reason: Arc<ScriptedBackend>) -> Gateway {
        Gateway::new(
            conv,
            reason,
            BackendSelector::new(vec!["schedule".into()], 400),
        )
    }

    fn prompt() -> Prompt {
        Prompt {
            system: "persona".into(),
            user: "hello".into(),
        }
    }

    #[tokio::test]
    async fn tool_results_route_to_reasoning_backend() {
        let gw = gateway(
            ScriptedBackend::ok("fast", vec!["hi"]),
            ScriptedBackend::ok("smart", vec!["hi"]),
        );

        let request = gw.compose(prompt(), "weather", true, 30);
        assert_eq!(request.tier, Tier::Reasoning);
        assert_eq!(request.backend_id, "smart");
    }

    #[tokio::test]
    async fn plain_chat_routes_to_conversational_backend() {
        let gw = gateway(
            ScriptedBackend::ok("fast", vec!["hi"]),
            ScriptedBackend::ok("smart", vec!["hi"]),
        );

        let request = gw.compose(prompt(), "converse", false, 30);
        assert_eq!(request.tier, Tier::Conversational);
        assert_eq!(request.backend_id, "fast");
    }

    #[tokio::test]
    async fn generate_streams_all_chunks() {
        let gw = gateway(
            ScriptedBackend::ok("fast", vec!["a", "b", "c"]),
            ScriptedBackend::ok("smart", vec![]),
        );
        let request = gw.compose(prompt(), "converse", false, 30);

        let mut stream = gw.generate(&request).await.unwrap();
        let mut out = Vec::new();
        while let Some(chunk) = stream.next_chunk().await {
            out.push(chunk.unwrap());
        }
        assert_eq!(out, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn failed_start_retried_exactly_once() {
        let conv = ScriptedBackend::failing_first("fast", 1);
        let gw = gateway(conv.clone(), ScriptedBackend::ok("smart", vec![]));
        let request = gw.compose(prompt(), "converse", false, 30);

        let stream = gw.generate(&request).await;
        assert!(stream.is_ok());
        assert_eq!(conv.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_failure_propagates() {
        let conv = ScriptedBackend::failing_first("fast", 2);
        let gw = gateway(conv.clone(), ScriptedBackend::ok("smart", vec![]));
        let request = gw.compose(prompt(), "converse", false, 30);

        let err = gw.generate(&request).await.unwrap_err();
        assert!(matches!(err, AiError::Unavailable(_)));
        assert_eq!(conv.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn requests_get_distinct_correlation_ids() {
        let gw = gateway(
            ScriptedBackend::ok("fast", vec![]),
            ScriptedBackend::ok("smart", vec![]),
        );
        let a = gw.compose(prompt(), "converse", false, 10);
        let b = gw.compose(prompt(), "converse", false, 10);
        assert_ne!(a.correlation_id, b.correlation_id);
    }
}
