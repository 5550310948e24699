//! Web search via a Perplexity-style chat-completions endpoint.

use async_trait::async_trait;

use crate::{Tool, ToolError};

pub struct WebSearchTool {
    endpoint: String,
    api_key: String,
    model: String,
    http: reqwest::Client,
}

impl WebSearchTool {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: "sonar".into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    async fn run(&self, params: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let query = params["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("missing query".into()))?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "Answer concisely with current information. Include dates for events."
                },
                { "role": "user", "content": query }
            ],
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ToolError::Rejected(format!(
                "search endpoint returned HTTP {}",
                response.status()
            )));
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        let answer = parsed["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default();
        if answer.is_empty() {
            return Err(ToolError::Rejected("empty search answer".into()));
        }

        Ok(serde_json::json!({ "query": query, "answer": answer }))
    }
}
