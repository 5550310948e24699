//! OpenAI-style chat-completions backend.
//!
//! Works against any compatible provider (the default conversational tier
//! points at Groq). Streams token deltas over SSE, terminated by the
//! `[DONE]` sentinel.

use async_trait::async_trait;
use tracing::debug;

use crate::streaming::sse_stream;
use crate::{AiError, ChunkStream, GenBackend, Prompt};

/// Chat-completions backend settings.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub id: String,
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl ChatConfig {
    pub fn new(
        id: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            model: "llama-3.3-70b-versatile".into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            temperature: 0.88,
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

pub struct ChatBackend {
    config: ChatConfig,
    http: reqwest::Client,
}

impl ChatBackend {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn build_body(&self, prompt: &Prompt) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "stream": true,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
        })
    }
}

#[async_trait]
impl GenBackend for ChatBackend {
    fn id(&self) -> &str {
        &self.config.id
    }

    async fn generate(&self, prompt: &Prompt) -> Result<ChunkStream, AiError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = self.build_body(prompt);

        debug!(model = %self.config.model, "chat-completions streaming request");

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
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
                        if event.data.trim() == "[DONE]" {
                            break;
                        }
                        let Ok(data) = serde_json::from_str::<serde_json::Value>(&event.data)
                        else {
                            continue;
                        };
                        if let Some(delta) = data["choices"][0]["delta"]["content"].as_str() {
                            if !delta.is_empty() && tx.send(Ok(delta.to_string())).await.is_err() {
                                // Consumer cancelled; stop pulling tokens.
                                break;
                            }
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
    fn config_builder_defaults() {
        let config = ChatConfig::new("conversational", "https://api.groq.com/openai/v1", "key")
            .with_model("mixtral-8x7b")
            .with_temperature(0.5);
        assert_eq!(config.id, "conversational");
        assert_eq!(config.model, "mixtral-8x7b");
        assert_eq!(config.temperature, 0.5);
        assert_eq!(config.max_tokens, 1200);
    }

    #[test]
    fn body_contains_both_roles() {
        let backend = ChatBackend::new(ChatConfig::new("c", "http://x", "k"));
        let body = backend.build_body(&Prompt {
            system: "persona".into(),
            user: "hello".into(),
        });
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["stream"], true);
    }

    #[tokio::test]
    async fn unreachable_backend_is_network_error() {
        let backend = ChatBackend::new(ChatConfig::new("c", "http://127.0.0.1:1", "k"));
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
