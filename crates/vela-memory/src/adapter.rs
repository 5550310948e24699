//! The adapter the session pipeline talks to.
//!
//! Wraps a [`MemoryStore`] with the two policies the pipeline relies on:
//! recall is bounded by a hard timeout and degrades to an empty context,
//! and commits are serialized per session so a later turn is never
//! observably persisted before an earlier one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;
use tracing::{debug, warn};
use vela_common::{SessionId, Turn};

use crate::{MemoryContext, MemoryStore};

enum CommitJob {
    Persist(Box<Turn>),
    Flush(oneshot::Sender<()>),
}

pub struct MemoryAdapter {
    store: Arc<dyn MemoryStore>,
    recall_timeout: Duration,
    commit_timeout: Duration,
    workers: Mutex<HashMap<SessionId, mpsc::UnboundedSender<CommitJob>>>,
}

impl MemoryAdapter {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        recall_timeout: Duration,
        commit_timeout: Duration,
    ) -> Self {
        Self {
            store,
            recall_timeout,
            commit_timeout,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Recall ranked context for a turn. Never fails: timeouts and store
    /// errors degrade to an empty context with a warning.
    pub async fn recall(&self, text: &str, limit: usize) -> MemoryContext {
        match timeout(self.recall_timeout, self.store.recall(text, limit)).await {
            Ok(Ok(context)) => context,
            Ok(Err(e)) => {
                warn!("memory recall failed, continuing without context: {e}");
                MemoryContext::empty()
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.recall_timeout.as_millis() as u64,
                    "memory recall timed out, continuing without context"
                );
                MemoryContext::empty()
            }
        }
    }

    /// Enqueue a turn for persistence. Fire-and-forget for the caller;
    /// commits for one session are applied strictly in enqueue order by a
    /// dedicated worker.
    pub async fn commit(&self, turn: Turn) {
        let session_id = turn.session_id.clone();
        let mut workers = self.workers.lock().await;
        let sender = workers
            .entry(session_id.clone())
            .or_insert_with(|| self.spawn_worker(session_id));

        if sender.send(CommitJob::Persist(Box::new(turn))).is_err() {
            warn!("commit worker gone, dropping turn");
        }
    }

    fn spawn_worker(&self, session_id: SessionId) -> mpsc::UnboundedSender<CommitJob> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let store = Arc::clone(&self.store);
        let commit_timeout = self.commit_timeout;

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    CommitJob::Persist(turn) => {
                        match timeout(commit_timeout, store.commit(&turn)).await {
                            Ok(Ok(())) => {
                                debug!(session_id = %session_id, turn_id = %turn.id, "turn committed")
                            }
                            Ok(Err(e)) => {
                                warn!(session_id = %session_id, "memory commit failed: {e}")
                            }
                            Err(_) => {
                                warn!(session_id = %session_id, "memory commit timed out")
                            }
                        }
                    }
                    CommitJob::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
        });

        tx
    }

    /// Wait until every enqueued commit has been applied. Used by the
    /// supervisor's ordered teardown.
    pub async fn flush(&self) {
        let senders: Vec<_> = {
            let workers = self.workers.lock().await;
            workers.values().cloned().collect()
        };

        for sender in senders {
            let (ack_tx, ack_rx) = oneshot::channel();
            if sender.send(CommitJob::Flush(ack_tx)).is_ok() {
                let _ = ack_rx.await;
            }
        }
    }

    /// Drop a session's commit worker, waiting for its queue to drain
    /// first so a closing session never loses enqueued commits.
    pub async fn release_session(&self, session_id: &SessionId) {
        let sender = self.workers.lock().await.remove(session_id);
        if let Some(sender) = sender {
            let (ack_tx, ack_rx) = oneshot::channel();
            if sender.send(CommitJob::Flush(ack_tx)).is_ok() {
                let _ = ack_rx.await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vela_common::{Author, Modality};

    use crate::{InMemoryStore, MemoryError};

    fn adapter_over(store: Arc<dyn MemoryStore>) -> MemoryAdapter {
        MemoryAdapter::new(store, Duration::from_millis(100), Duration::from_millis(100))
    }

    fn turn(sid: &SessionId, content: &str) -> Turn {
        Turn::now(sid.clone(), Author::Host, content, Modality::Text)
    }

    /// Store whose recall hangs past any reasonable timeout.
    struct StalledStore;

    #[async_trait]
    impl MemoryStore for StalledStore {
        async fn recall(&self, _: &str, _: usize) -> Result<MemoryContext, MemoryError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(MemoryContext::empty())
        }

        async fn commit(&self, _: &Turn) -> Result<(), MemoryError> {
            Ok(())
        }
    }

    /// Store that records commit order with an artificial per-commit delay.
    struct SlowRecorder {
        order: Mutex<Vec<String>>,
        committed: AtomicUsize,
    }

    #[async_trait]
    impl MemoryStore for SlowRecorder {
        async fn recall(&self, _: &str, _: usize) -> Result<MemoryContext, MemoryError> {
            Ok(MemoryContext::empty())
        }

        async fn commit(&self, turn: &Turn) -> Result<(), MemoryError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.order.lock().await.push(turn.content.clone());
            self.committed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn recall_timeout_degrades_to_empty() {
        let adapter = adapter_over(Arc::new(StalledStore));
        let ctx = adapter.recall("anything", 3).await;
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn recall_error_degrades_to_empty() {
        struct FailingStore;

        #[async_trait]
        impl MemoryStore for FailingStore {
            async fn recall(&self, _: &str, _: usize) -> Result<MemoryContext, MemoryError> {
                Err(MemoryError::Transport("connection refused".into()))
            }
            async fn commit(&self, _: &Turn) -> Result<(), MemoryError> {
                Ok(())
            }
        }

        let adapter = adapter_over(Arc::new(FailingStore));
        let ctx = adapter.recall("anything", 3).await;
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn commits_for_one_session_apply_in_order() {
        let store = Arc::new(SlowRecorder {
            order: Mutex::new(Vec::new()),
            committed: AtomicUsize::new(0),
        });
        let adapter = adapter_over(store.clone());
        let sid = SessionId::new();

        for i in 0..5 {
            adapter.commit(turn(&sid, &format!("turn {i}"))).await;
        }
        adapter.flush().await;

        let order = store.order.lock().await;
        let expected: Vec<String> = (0..5).map(|i| format!("turn {i}")).collect();
        assert_eq!(*order, expected);
    }

    #[tokio::test]
    async fn flush_waits_for_pending_commits() {
        let store = Arc::new(SlowRecorder {
            order: Mutex::new(Vec::new()),
            committed: AtomicUsize::new(0),
        });
        let adapter = adapter_over(store.clone());
        let sid = SessionId::new();

        for i in 0..3 {
            adapter.commit(turn(&sid, &format!("t{i}"))).await;
        }
        adapter.flush().await;

        assert_eq!(store.committed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn sessions_commit_independently() {
        let store = Arc::new(SlowRecorder {
            order: Mutex::new(Vec::new()),
            committed: AtomicUsize::new(0),
        });
        let adapter = adapter_over(store.clone());

        let a = SessionId::new();
        let b = SessionId::new();
        adapter.commit(turn(&a, "a1")).await;
        adapter.commit(turn(&b, "b1")).await;
        adapter.commit(turn(&a, "a2")).await;
        adapter.flush().await;

        let order = store.order.lock().await;
        // Per-session order holds regardless of interleaving across sessions.
        assert_eq!(order.iter().filter(|c| c.starts_with('a')).count(), 2);
        assert_eq!(order.iter().filter(|c| c.starts_with('b')).count(), 1);
        let a1 = order.iter().position(|c| c == "a1").unwrap();
        let a2 = order.iter().position(|c| c == "a2").unwrap();
        assert!(a1 < a2);
    }

    #[tokio::test]
    async fn release_session_waits_for_queue_drain() {
        let store = Arc::new(SlowRecorder {
            order: Mutex::new(Vec::new()),
            committed: AtomicUsize::new(0),
        });
        let adapter = adapter_over(store.clone());
        let sid = SessionId::new();

        for i in 0..4 {
            adapter.commit(turn(&sid, &format!("t{i}"))).await;
        }
        adapter.release_session(&sid).await;

        assert_eq!(store.committed.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn in_memory_round_trip_through_adapter() {
        let store = Arc::new(InMemoryStore::new());
        let adapter = adapter_over(store);
        let sid = SessionId::new();

        adapter.commit(turn(&sid, "vela likes rust")).await;
        adapter.flush().await;

        let ctx = adapter.recall("rust", 3).await;
        assert_eq!(ctx.snippets.len(), 1);
    }
}
