//! Transcript WebSocket broadcast server.
//!
//! Every output event is fanned out to all connected clients as a JSON
//! `{author, content, timestamp}` object. Clients get a system welcome
//! notice on connect; inbound messages are ignored.

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use vela_common::OutputEvent;

pub struct TranscriptServer {
    events: broadcast::Sender<OutputEvent>,
}

impl TranscriptServer {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self { events }
    }

    /// Sender side for the orchestrator's transcript sink.
    pub fn publisher(&self) -> broadcast::Sender<OutputEvent> {
        self.events.clone()
    }

    /// Bind and serve until the process exits.
    pub async fn run(self, bind: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(bind).await?;
        info!("transcript server listening on {bind}");

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let events = self.events.subscribe();
                    tokio::spawn(async move {
                        match accept_async(stream).await {
                            Ok(ws) => handle_client(ws, events).await,
                            Err(e) => {
                                warn!(peer = %addr, "websocket handshake failed: {e}");
                            }
                        }
                    });
                }
                Err(e) => {
                    warn!("tcp accept error: {e}");
                }
            }
        }
    }
}

async fn handle_client(
    ws: tokio_tungstenite::WebSocketStream<TcpStream>,
    mut events: broadcast::Receiver<OutputEvent>,
) {
    let (mut sink, mut stream) = ws.split();
    debug!("transcript client connected");

    let welcome = OutputEvent::system("Connected to transcript");
    if send_event(&mut sink, &welcome).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if send_event(&mut sink, &event).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "transcript client lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            inbound = stream.next() => match inbound {
                // Transcript is one-way; drain pings and ignore text.
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }

    debug!("transcript client disconnected");
}

async fn send_event<S>(sink: &mut S, event: &OutputEvent) -> Result<(), ()>
where
    S: futures_util::Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!("transcript serialization failed: {e}");
            return Ok(());
        }
    };
    sink.send(Message::text(json)).await.map_err(|_| ())
}
