//! Memory store adapter.
//!
//! Translates conversation turns into graph read/write operations behind a
//! narrow contract: `recall(text, limit)` returns ranked context snippets,
//! `commit(turn)` persists a turn. The graph engine itself is an external
//! collaborator; only its query contract lives here.
//!
//! Memory is an enrichment, not a correctness dependency: recall failures
//! and timeouts degrade to an empty context instead of propagating.

pub mod adapter;
pub mod graph;
pub mod in_memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vela_common::Turn;

pub use adapter::MemoryAdapter;
pub use graph::{GraphConfig, GraphStore};
pub use in_memory::InMemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("memory query timed out")]
    Timeout,

    #[error("memory transport error: {0}")]
    Transport(String),

    #[error("memory query rejected: {0}")]
    Rejected(String),
}

/// One ranked context snippet returned by recall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySnippet {
    pub text: String,
    pub score: f64,
}

/// Ranked prior context for a turn. Read-only to the session pipeline.
#[derive(Debug, Clone, Default)]
pub struct MemoryContext {
    pub snippets: Vec<MemorySnippet>,
}

impl MemoryContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }
}

/// The external memory engine's query contract.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn recall(&self, text: &str, limit: usize) -> Result<MemoryContext, MemoryError>;
    async fn commit(&self, turn: &Turn) -> Result<(), MemoryError>;
}
