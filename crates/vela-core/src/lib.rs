//! The multimodal turn orchestrator.
//!
//! For every inbound turn the session pipeline decides what the reply
//! needs (memory context, tool execution), selects a generation backend,
//! and streams the result to the speech and transcript sinks while
//! staying responsive to pause/cancel/shutdown signals. Sessions run as
//! independent tasks under the [`Supervisor`].

pub mod fanout;
pub mod intent;
pub mod session;
pub mod supervisor;

pub use fanout::{ChannelSink, DispatchAck, OutputFanout, Sink, SinkError, SpeechSink};
pub use intent::{Intent, IntentExtractor};
pub use session::{SessionContext, SessionHandle, SessionState};
pub use supervisor::{SinkFactory, Supervisor};
