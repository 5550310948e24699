//! HTTP client for the external graph memory engine.
//!
//! Speaks the recall/commit query contract: `POST /recall` with
//! `{text, limit}` returns a ranked list of `{text, score}`, `POST /commit`
//! accepts a serialized turn. Timeouts are enforced by the caller
//! ([`crate::MemoryAdapter`]); this client only maps transport and
//! application failures.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use vela_common::Turn;

use crate::{MemoryContext, MemoryError, MemorySnippet, MemoryStore};

/// Graph store connection settings.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl GraphConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

pub struct GraphStore {
    config: GraphConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RecallRow {
    text: String,
    score: f64,
}

impl GraphStore {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{path}", self.config.endpoint.trim_end_matches('/'));
        let mut req = self.http.post(url);
        if let Some(ref key) = self.config.api_key {
            req = req.bearer_auth(key);
        }
        req
    }
}

#[async_trait]
impl MemoryStore for GraphStore {
    async fn recall(&self, text: &str, limit: usize) -> Result<MemoryContext, MemoryError> {
        debug!(limit, "graph recall query");

        let response = self
            .request("recall")
            .json(&serde_json::json!({ "text": text, "limit": limit }))
            .send()
            .await
            .map_err(|e| MemoryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::Rejected(format!("HTTP {status}: {body}")));
        }

        let rows: Vec<RecallRow> = response
            .json()
            .await
            .map_err(|e| MemoryError::Transport(e.to_string()))?;

        let snippets = rows
            .into_iter()
            .map(|row| MemorySnippet {
                text: row.text,
                score: row.score,
            })
            .collect();

        Ok(MemoryContext { snippets })
    }

    async fn commit(&self, turn: &Turn) -> Result<(), MemoryError> {
        debug!(session_id = %turn.session_id, turn_id = %turn.id, "graph commit");

        let response = self
            .request("commit")
            .json(turn)
            .send()
            .await
            .map_err(|e| MemoryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::Rejected(format!("HTTP {status}: {body}")));
        }

        Ok(())
    }
}
