//! Core wire types: input turns and output events.
//!
//! A [`Turn`] is one input unit from a transcription collaborator (speech)
//! or a chat transport (text). It is immutable once created; the session
//! pipeline consumes it and the memory adapter persists it. An
//! [`OutputEvent`] is the unit delivered to each output sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{SessionId, TurnId};

/// Who produced a turn or output event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    /// The human host (spoken or typed input).
    Host,
    /// The agent's generated reply.
    Agent,
    /// Status and degradation notices.
    System,
}

/// How a turn arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Speech,
    Text,
}

/// One input utterance/message within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub session_id: SessionId,
    pub author: Author,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub modality: Modality,
}

impl Turn {
    /// Build a turn stamped with the current time.
    pub fn now(
        session_id: SessionId,
        author: Author,
        content: impl Into<String>,
        modality: Modality,
    ) -> Self {
        Self {
            id: TurnId::new(),
            session_id,
            author,
            content: content.into(),
            timestamp: Utc::now(),
            modality,
        }
    }
}

/// The unit delivered to each output sink, in order per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputEvent {
    pub author: Author,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl OutputEvent {
    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            author: Author::Agent,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// A system/status notice, distinguished for the transcript sink.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            author: Author::System,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}
