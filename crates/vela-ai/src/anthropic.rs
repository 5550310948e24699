//! Anthropic Messages API backend.
//!
//! Default provider for the reasoning tier. Streams `content_block_delta`
//! text deltas over SSE; the system prompt travels in the dedicated
//! `system` field rather than the message list.

use async_trait::async_trait;
use tracing::debug;

use crate::streaming::sse_stream;
use crate::{AiError, ChunkStream, GenBackend, Prompt};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages API backend settings.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub id: String,
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl AnthropicConfig {
    pub fn new(
        id: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            model: "claude-sonnet-4-20250514".into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            temperature: 0.7,
            max_tokens: 1200,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

pub struct AnthropicBackend {
    config: AnthropicConfig,
    http: reqwest::Client,
}

impl AnthropicBackend {
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn build_body(&self, prompt: &Prompt) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "stream": true,
            "system": prompt.system,
            "messages": [
                { "role": "user", "content": prompt.user },
            ],
        })
    }
}

#[async_trait]
impl GenBackend for AnthropicBackend {
    fn id(&self) -> &str {
        &self.config.id
    }

    async fn generate(&self, prompt: &Prompt) -> Result<ChunkStream, AiError> {
        let url = format!("{}/messages", self.config.base_url.trim_end_matches('/'));
        let body = self.build_body(prompt);

        debug!(model = %self.config.model, "messages API streaming request");

        let response = self
            .http
            .post(url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AiError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AiError::Unavailable(format!("HTTP {status}: {text}")));
        }

        Ok(ChunkStream::spawn(move |tx| async move {
            let mut sse = sse_stream(response);
            loop {
                match sse.next_event().await {
                    Ok(Some(event)) => {
                        match event.event.as_deref() {
                            Some("content_block_delta") => {
                                let Ok(data) =
                                    serde_json::from_str::<serde_json::Value>(&event.data)
                                else {
                                    continue;
                                };
                                if data["delta"]["type"] == "text_delta" {
                                    if let Some(text) = data["delta"]["text"].as_str() {
                                        if !text.is_empty()
                                            && tx.send(Ok(text.to_string())).await.is_err()
                                        {
                                            break;
                                        }
                                    }
                                }
                            }
                            Some("message_stop") => break,
                            Some("error") => {
                                let _ = tx
                                    .send(Err(AiError::Unavailable(event.data.clone())))
                                    .await;
                                break;
                            }
                            // message_start, ping, message_delta, block
                            // boundaries carry no text
                            _ => {}
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_puts_system_in_dedicated_field() {
        let backend = AnthropicBackend::new(AnthropicConfig::new("r", "http://x", "k"));
        let body = backend.build_body(&Prompt {
            system: "persona".into(),
            user: "hello".into(),
        });
        assert_eq!(body["system"], "persona");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["stream"], true);
    }

    #[tokio::test]
    async fn unreachable_backend_is_network_error() {
        let backend = AnthropicBackend::new(AnthropicConfig::new("r", "http://127.0.0.1:1", "k"));
        let err = backend
            .generate(&Prompt {
                system: "s".into(),
                user: "u".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Network(_)));
    }
}
