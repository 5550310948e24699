//! Per-session pipeline.
//!
//! Each session runs as one task owning its turn log and, at most, one
//! active generation. The pipeline stages (Extracting, Recalling,
//! Invoking, Generating) run in strict sequence, except that chunk
//! delivery is pipelined with production: a chunk is dispatched while the
//! next is still being generated. Pause holds the pipeline at stage
//! boundaries; cancel tears down the active stream and returns to Idle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use vela_ai::{Gateway, PromptBuilder};
use vela_common::{Author, Modality, OutputEvent, SessionError, SessionId, Turn};
use vela_config::VelaConfig;
use vela_memory::{MemoryAdapter, MemoryContext};
use vela_tools::Invoker;

use crate::fanout::OutputFanout;
use crate::intent::IntentExtractor;

/// Pipeline position, observable through [`SessionHandle::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Extracting,
    Recalling,
    Invoking,
    Generating,
    Dispatching,
    Paused,
    Closed,
}

/// Shared collaborators handed to every session.
pub struct SessionContext {
    pub config: Arc<VelaConfig>,
    pub extractor: Arc<IntentExtractor>,
    pub memory: Arc<MemoryAdapter>,
    pub invoker: Arc<Invoker>,
    pub gateway: Arc<Gateway>,
}

/// Control surface for one live session.
pub struct SessionHandle {
    id: SessionId,
    turn_tx: mpsc::Sender<Turn>,
    pause_tx: watch::Sender<bool>,
    cancel_tx: watch::Sender<u64>,
    state_rx: watch::Receiver<SessionState>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Queue a turn. At most one turn may be pending while another is in
    /// flight; beyond that the submission is rejected.
    pub fn submit(&self, turn: Turn) -> Result<(), SessionError> {
        if self.task.is_finished() {
            return Err(SessionError::Closed);
        }
        self.turn_tx.try_send(turn).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SessionError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SessionError::Closed,
        })
    }

    pub fn pause(&self) {
        let _ = self.pause_tx.send(true);
    }

    pub fn resume(&self) {
        let _ = self.pause_tx.send(false);
    }

    /// Cancel the in-flight turn, if any. Takes effect at the next safe
    /// suspension point.
    pub fn cancel(&self) {
        self.cancel_tx.send_modify(|epoch| *epoch += 1);
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Watch state transitions (used by the supervisor and tests).
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop accepting input, cancel any in-flight generation, and wait
    /// for the session task to finish. A paused session is resumed first
    /// so it can observe the close.
    pub async fn close(self) {
        self.resume();
        self.cancel();
        drop(self.turn_tx);
        let _ = self.task.await;
    }
}

/// Spawn a session task. The handle is the only way to reach it.
pub fn spawn_session(
    id: SessionId,
    ctx: Arc<SessionContext>,
    fanout: OutputFanout,
) -> SessionHandle {
    let (turn_tx, turn_rx) = mpsc::channel(1);
    let (pause_tx, pause_rx) = watch::channel(false);
    let (cancel_tx, cancel_rx) = watch::channel(0u64);
    let (state_tx, state_rx) = watch::channel(SessionState::Idle);

    let runner = SessionRunner {
        id: id.clone(),
        ctx,
        fanout,
        turn_rx,
        pause_rx,
        cancel_rx,
        state_tx,
        log: Vec::new(),
        last_summary: None,
    };

    let task = tokio::spawn(runner.run());

    SessionHandle {
        id,
        turn_tx,
        pause_tx,
        cancel_tx,
        state_rx,
        task,
    }
}

enum TurnOutcome {
    Completed,
    Cancelled,
    Aborted,
}

struct SessionRunner {
    id: SessionId,
    ctx: Arc<SessionContext>,
    fanout: OutputFanout,
    turn_rx: mpsc::Receiver<Turn>,
    pause_rx: watch::Receiver<bool>,
    cancel_rx: watch::Receiver<u64>,
    state_tx: watch::Sender<SessionState>,
    /// Append-only conversation log: recent window for prompts, input to
    /// summarization.
    log: Vec<(Author, String)>,
    last_summary: Option<Instant>,
}

impl SessionRunner {
    async fn run(mut self) {
        info!(session_id = %self.id, "session started");

        let greeting = self.ctx.config.agent.greeting.clone();
        if !greeting.is_empty() {
            self.fanout.dispatch(&OutputEvent::system(greeting));
        }

        let idle_timeout = Duration::from_secs(self.ctx.config.session.idle_timeout_secs);

        loop {
            self.set_state(SessionState::Idle);
            self.pause_gate().await;

            let turn = tokio::select! {
                turn = self.turn_rx.recv() => match turn {
                    Some(turn) => turn,
                    None => break,
                },
                _ = tokio::time::sleep(idle_timeout) => {
                    info!(session_id = %self.id, "session idle timeout");
                    break;
                }
            };

            self.pause_gate().await;
            match self.process_turn(turn).await {
                TurnOutcome::Completed => {}
                TurnOutcome::Cancelled => {
                    debug!(session_id = %self.id, "turn cancelled");
                }
                TurnOutcome::Aborted => {
                    debug!(session_id = %self.id, "turn aborted");
                }
            }
        }

        self.set_state(SessionState::Closed);
        self.ctx.memory.release_session(&self.id).await;
        self.fanout.shutdown().await;
        info!(session_id = %self.id, "session closed");
    }

    fn set_state(&self, state: SessionState) {
        let _ = self.state_tx.send(state);
    }

    /// Hold here while paused. Re-enters the state it suspended from.
    async fn pause_gate(&mut self) {
        if !*self.pause_rx.borrow_and_update() {
            return;
        }
        let prior = *self.state_tx.borrow();
        self.set_state(SessionState::Paused);
        debug!(session_id = %self.id, "session paused");
        while *self.pause_rx.borrow_and_update() {
            if self.pause_rx.changed().await.is_err() {
                break;
            }
        }
        debug!(session_id = %self.id, "session resumed");
        self.set_state(prior);
    }

    /// True if a cancel arrived since the last check.
    fn take_cancel(&mut self) -> bool {
        self.cancel_rx
            .has_changed()
            .map(|changed| {
                if changed {
                    self.cancel_rx.borrow_and_update();
                }
                changed
            })
            .unwrap_or(false)
    }

    async fn process_turn(&mut self, turn: Turn) -> TurnOutcome {
        // Mark the cancel epoch for this turn; earlier signals are stale.
        self.cancel_rx.borrow_and_update();

        let config = Arc::clone(&self.ctx.config);

        self.set_state(SessionState::Extracting);
        let intent = self.ctx.extractor.extract(&turn.content);
        debug!(session_id = %self.id, intent = %intent.label, "intent extracted");

        self.pause_gate().await;
        self.set_state(SessionState::Recalling);
        let memory_ctx = if intent.wants_memory() {
            self.ctx
                .memory
                .recall(&turn.content, config.memory.recall_limit)
                .await
        } else {
            MemoryContext::empty()
        };

        if self.take_cancel() {
            return TurnOutcome::Cancelled;
        }
        self.pause_gate().await;

        let invocations = if intent.tool_labels.is_empty() {
            Vec::new()
        } else {
            self.set_state(SessionState::Invoking);
            let mut cancel_rx = self.cancel_rx.clone();
            tokio::select! {
                _ = cancel_rx.changed() => return TurnOutcome::Cancelled,
                invocations = self.ctx.invoker.invoke(&intent.tool_labels, &turn.content) => {
                    invocations
                }
            }
        };

        self.pause_gate().await;
        self.set_state(SessionState::Generating);

        let recent_window = config.memory.recent_window;
        let recent_start = self.log.len().saturating_sub(recent_window);
        let prompt = PromptBuilder::new(&config.agent.persona)
            .with_memory(&memory_ctx)
            .with_conversation(&self.log[recent_start..])
            .with_tool_results(&invocations)
            .build(&turn.content);

        let request = self.ctx.gateway.compose(
            prompt,
            &intent.label,
            !invocations.is_empty(),
            turn.content.chars().count(),
        );
        debug!(
            session_id = %self.id,
            correlation_id = %request.correlation_id,
            backend = %request.backend_id,
            "generation request composed"
        );

        let stream = match self.ctx.gateway.generate(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(session_id = %self.id, "generation failed to start: {e}");
                return self.abort_with_notice(turn).await;
            }
        };

        let outcome = self.stream_reply(stream).await;
        match outcome {
            StreamOutcome::Done(reply) => {
                self.set_state(SessionState::Dispatching);
                self.fanout.end_turn().await;
                self.finish_turn(turn, reply).await;
                TurnOutcome::Completed
            }
            StreamOutcome::Cancelled => {
                self.fanout.abort_turn();
                TurnOutcome::Cancelled
            }
            StreamOutcome::Failed => self.abort_with_notice(turn).await,
        }
    }

    /// Drain the chunk stream, forwarding each chunk to the fan-out as it
    /// arrives. Returns the full reply on success.
    async fn stream_reply(&mut self, mut stream: vela_ai::ChunkStream) -> StreamOutcome {
        let idle = Duration::from_millis(self.ctx.config.generation.stream_idle_timeout_ms);
        let grace = Duration::from_millis(self.ctx.config.generation.cancel_grace_ms);
        let mut reply = String::new();

        loop {
            self.pause_gate().await;
            let mut cancel_rx = self.cancel_rx.clone();

            // Resolve the step first so the stream borrow ends before any
            // teardown that needs to consume it.
            let step = tokio::select! {
                _ = cancel_rx.changed() => Step::Cancelled,
                next = timeout(idle, stream.next_chunk()) => match next {
                    Err(_) => Step::Stalled,
                    Ok(None) => Step::Ended,
                    Ok(Some(Ok(chunk))) => Step::Chunk(chunk),
                    Ok(Some(Err(e))) => Step::Error(e),
                }
            };

            match step {
                Step::Chunk(chunk) => {
                    self.set_state(SessionState::Dispatching);
                    reply.push_str(&chunk);
                    self.fanout.dispatch(&OutputEvent::agent(chunk));
                    self.set_state(SessionState::Generating);
                }
                Step::Ended => return StreamOutcome::Done(reply),
                Step::Cancelled => {
                    self.cancel_rx.borrow_and_update();
                    stream.cancel(grace).await;
                    return StreamOutcome::Cancelled;
                }
                Step::Stalled => {
                    warn!(session_id = %self.id, "generation stream stalled");
                    stream.cancel(grace).await;
                    return StreamOutcome::Failed;
                }
                Step::Error(e) => {
                    warn!(session_id = %self.id, "generation stream error: {e}");
                    stream.cancel(grace).await;
                    return StreamOutcome::Failed;
                }
            }
        }
    }

    /// Generation abort: notify the sinks, persist the input turn, and
    /// let the caller return the session to Idle.
    async fn abort_with_notice(&mut self, turn: Turn) -> TurnOutcome {
        self.fanout.dispatch(&OutputEvent::system(
            "I ran into a problem generating a reply. Let's try that again.",
        ));
        self.fanout.end_turn().await;
        self.log.push((Author::Host, turn.content.clone()));
        self.ctx.memory.commit(turn).await;
        TurnOutcome::Aborted
    }

    /// Success path: commit the exchange in arrival order and update the
    /// session log.
    async fn finish_turn(&mut self, turn: Turn, reply: String) {
        self.log.push((Author::Host, turn.content.clone()));
        self.log.push((Author::Agent, reply.clone()));

        let reply_turn = Turn::now(self.id.clone(), Author::Agent, reply, Modality::Text);
        self.ctx.memory.commit(turn).await;
        self.ctx.memory.commit(reply_turn).await;

        self.maybe_summarize().await;
    }

    /// Fold older turns into a committed summary once the log outgrows
    /// the configured threshold. Best-effort: failures only log.
    async fn maybe_summarize(&mut self) {
        let summary_cfg = &self.ctx.config.memory.summary;
        let estimated: usize = self
            .log
            .iter()
            .map(|(_, content)| estimate_tokens(content))
            .sum();
        if estimated < summary_cfg.token_threshold {
            return;
        }
        let cooldown = Duration::from_secs(summary_cfg.cooldown_secs);
        if let Some(last) = self.last_summary {
            if last.elapsed() < cooldown {
                return;
            }
        }

        let keep = self.ctx.config.memory.recent_window.min(self.log.len());
        let cut = self.log.len() - keep;
        if cut == 0 {
            return;
        }

        let older: Vec<String> = self.log[..cut]
            .iter()
            .map(|(author, content)| {
                let speaker = match author {
                    Author::Host => "Host",
                    Author::Agent => "Agent",
                    Author::System => "Summary",
                };
                format!("{speaker}: {content}")
            })
            .collect();

        let prompt = PromptBuilder::new(format!(
            "Summarize the conversation below in at most {} tokens. Keep \
             facts, decisions, and open threads; drop pleasantries.",
            summary_cfg.target_tokens
        ))
        .build(&older.join("\n"));

        let request = self.ctx.gateway.compose(prompt, "summarize", false, 0);
        let mut stream = match self.ctx.gateway.generate(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(session_id = %self.id, "summarization skipped: {e}");
                return;
            }
        };

        let idle = Duration::from_millis(self.ctx.config.generation.stream_idle_timeout_ms);
        let mut summary = String::new();
        loop {
            match timeout(idle, stream.next_chunk()).await {
                Ok(Some(Ok(chunk))) => summary.push_str(&chunk),
                Ok(Some(Err(e))) => {
                    warn!(session_id = %self.id, "summarization stream error: {e}");
                    return;
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(session_id = %self.id, "summarization stalled");
                    return;
                }
            }
        }
        if summary.trim().is_empty() {
            return;
        }

        let summary_turn = Turn::now(self.id.clone(), Author::System, summary.clone(), Modality::Text);
        self.ctx.memory.commit(summary_turn).await;

        self.log.drain(..cut);
        self.log.insert(0, (Author::System, summary));
        self.last_summary = Some(Instant::now());
        info!(session_id = %self.id, folded = cut, "conversation summarized");
    }
}

enum StreamOutcome {
    Done(String),
    Cancelled,
    Failed,
}

enum Step {
    Chunk(String),
    Ended,
    Cancelled,
    Stalled,
    Error(vela_ai::AiError),
}

/// Rough token count, ~4 chars per token.
fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_matches_heuristic() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens(&"x".repeat(400)), 100);
    }
}
