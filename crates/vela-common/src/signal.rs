//! Out-of-band control signals.
//!
//! Pause/resume/cancel/shutdown arrive outside the turn input path and
//! take effect at the next safe suspension point. The bus is a broadcast
//! channel so the supervisor and every transport can observe the same
//! stream of signals.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::id::SessionId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ControlSignal {
    PauseAll,
    ResumeAll,
    Cancel(SessionId),
    Shutdown,
}

pub struct SignalBus {
    sender: broadcast::Sender<ControlSignal>,
}

impl SignalBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlSignal> {
        self.sender.subscribe()
    }

    /// Publish a signal. Returns the number of receivers it reached.
    pub fn publish(&self, signal: ControlSignal) -> usize {
        self.sender.send(signal).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = SignalBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(ControlSignal::PauseAll);

        let signal = rx.recv().await.unwrap();
        assert!(matches!(signal, ControlSignal::PauseAll));
    }

    #[tokio::test]
    async fn multiple_subscribers_see_same_signal() {
        let bus = SignalBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(ControlSignal::Shutdown);

        assert!(matches!(rx1.recv().await.unwrap(), ControlSignal::Shutdown));
        assert!(matches!(rx2.recv().await.unwrap(), ControlSignal::Shutdown));
    }

    #[tokio::test]
    async fn cancel_carries_session_id() {
        let bus = SignalBus::new(16);
        let mut rx = bus.subscribe();
        let sid = SessionId::new();

        bus.publish(ControlSignal::Cancel(sid.clone()));

        let signal = rx.recv().await.unwrap();
        assert!(matches!(signal, ControlSignal::Cancel(id) if id == sid));
    }

    #[test]
    fn publish_returns_zero_with_no_subscribers() {
        let bus = SignalBus::new(16);
        assert_eq!(bus.publish(ControlSignal::ResumeAll), 0);
    }
}
