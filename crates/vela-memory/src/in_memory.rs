//! In-memory store used when no graph endpoint is configured, and by
//! tests. Ranks recall results by naive token overlap with the query.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;
use vela_common::Turn;

use crate::{MemoryContext, MemoryError, MemorySnippet, MemoryStore};

#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<Vec<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn recall(&self, text: &str, limit: usize) -> Result<MemoryContext, MemoryError> {
        let query = tokenize(text);
        if query.is_empty() {
            return Ok(MemoryContext::empty());
        }

        let entries = self.entries.lock().await;
        let mut scored: Vec<MemorySnippet> = entries
            .iter()
            .filter_map(|entry| {
                let tokens = tokenize(entry);
                let overlap = query.intersection(&tokens).count();
                if overlap == 0 {
                    return None;
                }
                Some(MemorySnippet {
                    text: entry.clone(),
                    score: overlap as f64 / query.len() as f64,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);

        Ok(MemoryContext { snippets: scored })
    }

    async fn commit(&self, turn: &Turn) -> Result<(), MemoryError> {
        self.entries.lock().await.push(turn.content.clone());
        Ok(())
    }
}
