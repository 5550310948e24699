//! Configuration schema types for Vela.
//!
//! All structs use `serde(default)` so partial configs work correctly.

use serde::{Deserialize, Serialize};

/// Root configuration for the orchestrator.
///
/// All options have sensible defaults; only override what you want to
/// change.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VelaConfig {
    pub agent: AgentConfig,
    pub intents: IntentsConfig,
    pub generation: GenerationConfig,
    pub memory: MemoryConfig,
    pub tools: ToolsConfig,
    pub session: SessionConfig,
    pub fanout: FanoutConfig,
    pub transcript: TranscriptConfig,
}

/// Agent identity and persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    /// System prompt prepended to every generation request.
    pub persona: String,
    /// Emitted to the transcript sink when a session starts.
    pub greeting: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Vela".into(),
            persona: "You are Vela, a live conversational host. Keep replies \
                      natural, engaging, and grounded in any tool results you \
                      are given."
                .into(),
            greeting: "Hey! I'm Vela — ask me anything.".into(),
        }
    }
}

/// One trigger set in the intent priority table.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TriggerSet {
    pub label: String,
    /// Higher wins when several sets match.
    pub priority: u32,
    pub keywords: Vec<String>,
    pub phrases: Vec<String>,
}

/// Intent trigger table. First match in priority order wins the label;
/// every matching set still contributes its tool triggers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentsConfig {
    pub triggers: Vec<TriggerSet>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for IntentsConfig {
    fn default() -> Self {
        Self {
            triggers: vec![
                TriggerSet {
                    label: "schedule".into(),
                    priority: 50,
                    keywords: strings(&["schedule", "remind me", "plan", "series"]),
                    phrases: strings(&["schedule a post", "plan posts", "post later", "remind me to"]),
                },
                TriggerSet {
                    label: "post".into(),
                    priority: 40,
                    keywords: strings(&["tweet", "post now"]),
                    phrases: strings(&["post this", "send this post", "tweet this"]),
                },
                TriggerSet {
                    label: "crypto".into(),
                    priority: 30,
                    keywords: strings(&["bitcoin", "btc", "eth", "ethereum", "price", "market", "crypto"]),
                    phrases: strings(&["how much is", "what's the price", "show me the market"]),
                },
                TriggerSet {
                    label: "weather".into(),
                    priority: 30,
                    keywords: strings(&["weather", "forecast", "temperature", "raining"]),
                    phrases: strings(&["what's the weather", "how hot is it", "is it raining"]),
                },
                TriggerSet {
                    label: "time".into(),
                    priority: 25,
                    keywords: strings(&["timezone", "what time"]),
                    phrases: strings(&["what time is it", "current time in"]),
                },
                TriggerSet {
                    label: "search".into(),
                    priority: 20,
                    keywords: strings(&["news", "latest", "current", "today", "happened", "recent"]),
                    phrases: strings(&["what is happening", "what happened", "search for"]),
                },
                TriggerSet {
                    label: "memory".into(),
                    priority: 10,
                    keywords: strings(&["remember", "you said", "earlier", "before", "last time", "previously"]),
                    phrases: strings(&["do you recall", "as we discussed", "like you mentioned"]),
                },
            ],
        }
    }
}

/// One generation backend tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Stable identifier used in logs and request records.
    pub id: String,
    pub model: String,
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            id: "conversational".into(),
            model: "llama-3.3-70b-versatile".into(),
            base_url: "https://api.groq.com/openai/v1".into(),
            api_key_env: "GROQ_API_KEY".into(),
            temperature: 0.88,
            max_tokens: 1200,
        }
    }
}

/// Generation gateway settings: the two backend tiers plus the rule-based
/// selection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub conversational: BackendConfig,
    pub reasoning: BackendConfig,
    /// Intent labels that always route to the reasoning tier.
    pub reasoning_intents: Vec<String>,
    /// Inputs at or above this length route to the reasoning tier.
    pub reasoning_min_chars: usize,
    /// Abort the stream if no chunk arrives within this window.
    pub stream_idle_timeout_ms: u64,
    /// Grace period for mid-stream cancellation to release resources.
    pub cancel_grace_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            conversational: BackendConfig::default(),
            reasoning: BackendConfig {
                id: "reasoning".into(),
                model: "claude-sonnet-4-20250514".into(),
                base_url: "https://api.anthropic.com/v1".into(),
                api_key_env: "ANTHROPIC_API_KEY".into(),
                temperature: 0.7,
                max_tokens: 1200,
            },
            reasoning_intents: strings(&["schedule", "post"]),
            reasoning_min_chars: 400,
            stream_idle_timeout_ms: 30_000,
            cancel_grace_ms: 500,
        }
    }
}

/// Conversation summarization thresholds (token counts are estimates).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub token_threshold: usize,
    pub target_tokens: usize,
    pub cooldown_secs: u64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            token_threshold: 12_800,
            target_tokens: 4_096,
            cooldown_secs: 300,
        }
    }
}

/// Memory store adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Graph query endpoint. Empty means run on the in-memory store.
    pub endpoint: String,
    pub api_key_env: String,
    pub recall_limit: usize,
    pub recall_timeout_ms: u64,
    pub commit_timeout_ms: u64,
    /// How many recent turns to include in generation prompts.
    pub recent_window: usize,
    pub summary: SummaryConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key_env: "VELA_MEMORY_API_KEY".into(),
            recall_limit: 3,
            recall_timeout_ms: 2_000,
            commit_timeout_ms: 5_000,
            recent_window: 20,
            summary: SummaryConfig::default(),
        }
    }
}

/// Tool invoker settings. Every tool call is independently timed out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub timeout_ms: u64,
    pub weather_endpoint: String,
    pub crypto_endpoint: String,
    pub crypto_api_key_env: String,
    pub search_endpoint: String,
    pub search_api_key_env: String,
    pub time_endpoint: String,
    pub schedule_endpoint: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            weather_endpoint: "https://api.open-meteo.com/v1/forecast".into(),
            crypto_endpoint: "https://api.coingecko.com/api/v3".into(),
            crypto_api_key_env: "COINGECKO_API_KEY".into(),
            search_endpoint: "https://api.perplexity.ai/chat/completions".into(),
            search_api_key_env: "PERPLEXITY_API_KEY".into(),
            time_endpoint: "https://timeapi.io".into(),
            schedule_endpoint: String::new(),
        }
    }
}

/// Per-session lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_sessions: usize,
    pub idle_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: 64,
            idle_timeout_secs: 1800,
        }
    }
}

/// Output fan-out tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Bounded queue depth per sink before the degraded-sink policy kicks in.
    pub sink_buffer: usize,
    pub speech_enabled: bool,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            sink_buffer: 64,
            speech_enabled: true,
        }
    }
}

/// Transcript WebSocket broadcast server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    pub bind: String,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8765".into(),
        }
    }
}
