//! Orchestrator supervisor.
//!
//! Owns the map from session id to live session, global pause/resume,
//! per-session cancellation, and ordered teardown: stop new input, close
//! sessions (cancelling in-flight generations), then flush pending memory
//! commits.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tracing::{info, warn};
use vela_common::{SessionError, SessionId, Turn};

use crate::fanout::{OutputFanout, Sink};
use crate::session::{spawn_session, SessionContext, SessionHandle, SessionState};

/// Builds the sink set for a new session. Sinks carry per-session state
/// (the speech sentence buffer), so each session gets fresh instances
/// over the shared output boundaries.
pub type SinkFactory = Box<dyn Fn(&SessionId) -> Vec<Arc<dyn Sink>> + Send + Sync>;

pub struct Supervisor {
    ctx: Arc<SessionContext>,
    sink_factory: SinkFactory,
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    accepting: AtomicBool,
    paused: AtomicBool,
}

impl Supervisor {
    pub fn new(ctx: SessionContext, sink_factory: SinkFactory) -> Self {
        Self {
            ctx: Arc::new(ctx),
            sink_factory,
            sessions: RwLock::new(HashMap::new()),
            accepting: AtomicBool::new(true),
            paused: AtomicBool::new(false),
        }
    }

    /// Route a turn to its session, creating the session on first input.
    pub async fn submit(&self, turn: Turn) -> Result<(), SessionError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }

        let session_id = turn.session_id.clone();
        let mut sessions = self.sessions.write().await;

        // Reap sessions that closed on their own (idle timeout).
        sessions.retain(|_, handle| !handle.is_closed());

        let live = sessions.len();
        let max = self.ctx.config.session.max_sessions;

        match sessions.entry(session_id.clone()) {
            Entry::Occupied(entry) => entry.get().submit(turn),
            Entry::Vacant(entry) => {
                if live >= max {
                    warn!(session_id = %session_id, live, "session capacity exhausted");
                    return Err(SessionError::CapacityExhausted(live));
                }
                let sinks = (self.sink_factory)(&session_id);
                let fanout = OutputFanout::new(sinks, self.ctx.config.fanout.sink_buffer);
                let handle = spawn_session(session_id.clone(), Arc::clone(&self.ctx), fanout);
                if self.paused.load(Ordering::SeqCst) {
                    handle.pause();
                }
                info!(session_id = %session_id, "session created");
                entry.insert(handle).submit(turn)
            }
        }
    }

    /// Suspend every session at its next safe point.
    pub async fn pause_all(&self) {
        self.paused.store(true, Ordering::SeqCst);
        for handle in self.sessions.read().await.values() {
            handle.pause();
        }
        info!("all sessions paused");
    }

    /// Resume every session into the state it was suspended from.
    pub async fn resume_all(&self) {
        self.paused.store(false, Ordering::SeqCst);
        for handle in self.sessions.read().await.values() {
            handle.resume();
        }
        info!("all sessions resumed");
    }

    /// Cancel one session's in-flight generation without touching others.
    pub async fn cancel_current_generation(
        &self,
        session_id: &SessionId,
    ) -> Result<(), SessionError> {
        let sessions = self.sessions.read().await;
        let handle = sessions
            .get(session_id)
            .ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))?;
        handle.cancel();
        Ok(())
    }

    pub async fn session_state(&self, session_id: &SessionId) -> Option<SessionState> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(SessionHandle::state)
    }

    /// Watch a session's state transitions (supervisor dashboards, tests).
    pub async fn watch_session(
        &self,
        session_id: &SessionId,
    ) -> Option<watch::Receiver<SessionState>> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(SessionHandle::watch_state)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Ordered teardown: stop accepting input, close every session
    /// (cancelling in-flight generations and releasing its sinks), then
    /// flush pending memory commits.
    pub async fn shutdown(&self) {
        info!("supervisor shutting down");
        self.accepting.store(false, Ordering::SeqCst);

        let handles: Vec<SessionHandle> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            handle.close().await;
        }

        self.ctx.memory.flush().await;
        info!("supervisor shutdown complete");
    }
}
