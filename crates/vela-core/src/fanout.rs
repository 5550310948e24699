//! Output fan-out.
//!
//! Delivers each chunk to every sink independently. Each sink gets its
//! own bounded queue and worker; a slow or failed sink never blocks the
//! others. On overflow the sink is marked degraded: remaining chunks for
//! the current turn are dropped for that sink only, and a one-time
//! degradation notice is queued to it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use vela_common::OutputEvent;

#[derive(Debug, thiserror::Error)]
#[error("sink delivery failed: {0}")]
pub struct SinkError(pub String);

/// An output consumer: speech synthesis or transcript/display.
#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, event: &OutputEvent) -> Result<(), SinkError>;

    /// Called at the end of each turn so sinks with internal buffering
    /// (e.g. sentence assembly for speech) can flush.
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Per-dispatch delivery outcome for one sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchAck {
    pub sink: String,
    pub accepted: bool,
}

enum LaneItem {
    Event(OutputEvent),
    Flush,
}

/// Upper bound on waiting for queue space when enqueueing a flush.
const FLUSH_ENQUEUE_WAIT: std::time::Duration = std::time::Duration::from_secs(2);

struct Lane {
    name: String,
    tx: mpsc::Sender<LaneItem>,
    degraded: Arc<AtomicBool>,
    notice_pending: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

pub struct OutputFanout {
    lanes: Vec<Lane>,
}

impl OutputFanout {
    pub fn new(sinks: Vec<Arc<dyn Sink>>, buffer: usize) -> Self {
        let lanes = sinks
            .into_iter()
            .map(|sink| {
                let (tx, mut rx) = mpsc::channel::<LaneItem>(buffer);
                let degraded = Arc::new(AtomicBool::new(false));
                let notice_pending = Arc::new(AtomicBool::new(false));
                let name = sink.name().to_string();

                let worker_notice = Arc::clone(&notice_pending);
                let worker_name = name.clone();
                let worker = tokio::spawn(async move {
                    while let Some(item) = rx.recv().await {
                        match item {
                            LaneItem::Event(event) => {
                                if let Err(e) = sink.deliver(&event).await {
                                    warn!(sink = %worker_name, "delivery failed: {e}");
                                }
                            }
                            LaneItem::Flush => {
                                if let Err(e) = sink.flush().await {
                                    warn!(sink = %worker_name, "flush failed: {e}");
                                }
                            }
                        }
                        // Emit the one-time degradation notice as soon as
                        // the queue has drained enough to accept it.
                        if worker_notice.swap(false, Ordering::SeqCst) {
                            let notice = OutputEvent::system(format!(
                                "output to {worker_name} degraded, some content was skipped"
                            ));
                            if let Err(e) = sink.deliver(&notice).await {
                                warn!(sink = %worker_name, "degradation notice failed: {e}");
                            }
                        }
                    }
                });

                Lane {
                    name,
                    tx,
                    degraded,
                    notice_pending,
                    worker,
                }
            })
            .collect();

        Self { lanes }
    }

    /// Deliver one chunk to every non-degraded sink. Never blocks on a
    /// slow sink: a full queue marks the sink degraded for the rest of
    /// the turn.
    pub fn dispatch(&self, event: &OutputEvent) -> Vec<DispatchAck> {
        self.lanes
            .iter()
            .map(|lane| {
                if lane.degraded.load(Ordering::SeqCst) {
                    return DispatchAck {
                        sink: lane.name.clone(),
                        accepted: false,
                    };
                }
                let accepted = match lane.tx.try_send(LaneItem::Event(event.clone())) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(sink = %lane.name, "queue overflow, degrading sink for this turn");
                        lane.degraded.store(true, Ordering::SeqCst);
                        lane.notice_pending.store(true, Ordering::SeqCst);
                        false
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        warn!(sink = %lane.name, "sink worker gone");
                        false
                    }
                };
                DispatchAck {
                    sink: lane.name.clone(),
                    accepted,
                }
            })
            .collect()
    }

    /// End-of-turn bookkeeping: flush buffered sinks and clear the
    /// degraded markers so the next turn starts clean. The flush enqueue
    /// is bounded so a wedged sink cannot hold the session hostage.
    pub async fn end_turn(&self) {
        for lane in &self.lanes {
            let enqueue = lane.tx.send(LaneItem::Flush);
            if tokio::time::timeout(FLUSH_ENQUEUE_WAIT, enqueue).await.is_err() {
                warn!(sink = %lane.name, "flush enqueue timed out");
            }
            lane.degraded.store(false, Ordering::SeqCst);
        }
    }

    /// Discard undispatched queue contents on cancellation. The bounded
    /// queues drain naturally; we only reset degradation markers here.
    pub fn abort_turn(&self) {
        for lane in &self.lanes {
            lane.degraded.store(false, Ordering::SeqCst);
            lane.notice_pending.store(false, Ordering::SeqCst);
        }
    }

    /// Flush buffered sinks, drain every queue, and stop the workers.
    /// Part of the supervisor's ordered teardown.
    pub async fn shutdown(self) {
        for lane in &self.lanes {
            let _ = lane.tx.send(LaneItem::Flush).await;
        }
        for lane in self.lanes {
            // Dropping the sender ends the worker once the queue drains.
            drop(lane.tx);
            let _ = lane.worker.await;
        }
    }
}

/// Sink writing events into an mpsc channel: the transcript broadcast
/// path, and the synthesizer boundary in tests.
pub struct ChannelSink {
    name: String,
    tx: mpsc::Sender<OutputEvent>,
}

impl ChannelSink {
    pub fn new(name: impl Into<String>, tx: mpsc::Sender<OutputEvent>) -> Self {
        Self {
            name: name.into(),
            tx,
        }
    }
}

#[async_trait]
impl Sink for ChannelSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, event: &OutputEvent) -> Result<(), SinkError> {
        self.tx
            .send(event.clone())
            .await
            .map_err(|_| SinkError(format!("{} channel closed", self.name)))
    }
}

/// Speech-synthesis sink. Re-chunks streamed text on sentence boundaries
/// before handing it to the synthesizer so TTS never receives mid-word
/// fragments.
pub struct SpeechSink {
    synth_tx: mpsc::Sender<String>,
    buffer: Mutex<String>,
}

const SENTENCE_BOUNDARIES: &[char] = &['.', ',', '?', '!', ';', ':', '-', ')', ']', '}'];

impl SpeechSink {
    pub fn new(synth_tx: mpsc::Sender<String>) -> Self {
        Self {
            synth_tx,
            buffer: Mutex::new(String::new()),
        }
    }

    async fn emit(&self, text: String) -> Result<(), SinkError> {
        self.synth_tx
            .send(text)
            .await
            .map_err(|_| SinkError("synthesizer channel closed".into()))
    }
}

#[async_trait]
impl Sink for SpeechSink {
    fn name(&self) -> &str {
        "speech"
    }

    async fn deliver(&self, event: &OutputEvent) -> Result<(), SinkError> {
        // Status notices are transcript-only.
        if event.author == vela_common::Author::System {
            return Ok(());
        }

        let ready = {
            let mut buffer = self.buffer.lock().await;
            buffer.push_str(&event.content);
            let cut = buffer
                .rfind(SENTENCE_BOUNDARIES)
                .map(|pos| pos + 1)
                .unwrap_or(0);
            if cut == 0 {
                None
            } else {
                let ready: String = buffer[..cut].to_string();
                buffer.replace_range(..cut, "");
                Some(ready)
            }
        };

        if let Some(text) = ready {
            self.emit(text).await?;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let rest = {
            let mut buffer = self.buffer.lock().await;
            std::mem::take(&mut *buffer)
        };
        if !rest.trim().is_empty() {
            debug!("flushing trailing speech fragment");
            self.emit(rest).await?;
        }
        Ok(())
    }
}
