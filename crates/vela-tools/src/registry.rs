//! Closed tool registry.
//!
//! Each tool is a fixed variant with a typed parameter schema, looked up
//! by intent label. Parameter extraction is keyword/pattern based; no
//! model call on the routing path.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Tool, ToolError};

/// A typed, planned tool call derived from a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolRequest {
    Weather { location: String },
    CryptoPrice { symbol: String },
    WebSearch { query: String },
    CurrentTime { timezone: String },
    SchedulePost { content: String, at: String },
}

impl ToolRequest {
    pub fn tool_name(&self) -> &'static str {
        match self {
            ToolRequest::Weather { .. } => "weather",
            ToolRequest::CryptoPrice { .. } => "crypto_price",
            ToolRequest::WebSearch { .. } => "web_search",
            ToolRequest::CurrentTime { .. } => "current_time",
            ToolRequest::SchedulePost { .. } => "schedule_post",
        }
    }

    pub fn params(&self) -> serde_json::Value {
        match self {
            ToolRequest::Weather { location } => serde_json::json!({ "location": location }),
            ToolRequest::CryptoPrice { symbol } => serde_json::json!({ "symbol": symbol }),
            ToolRequest::WebSearch { query } => serde_json::json!({ "query": query }),
            ToolRequest::CurrentTime { timezone } => serde_json::json!({ "timezone": timezone }),
            ToolRequest::SchedulePost { content, at } => {
                serde_json::json!({ "content": content, "at": at })
            }
        }
    }

    /// Build the request for an intent label from the raw turn text.
    /// Returns `None` for labels with no tool mapping (e.g. "converse",
    /// "memory").
    pub fn from_label(label: &str, text: &str) -> Option<Result<ToolRequest, ToolError>> {
        match label {
            "weather" => Some(
                extract_location(text)
                    .map(|location| ToolRequest::Weather { location })
                    .ok_or_else(|| {
                        ToolError::InvalidParams("no location found in message".into())
                    }),
            ),
            "crypto" => Some(
                extract_symbol(text)
                    .map(|symbol| ToolRequest::CryptoPrice { symbol })
                    .ok_or_else(|| ToolError::InvalidParams("no known asset in message".into())),
            ),
            "search" => Some(Ok(ToolRequest::WebSearch {
                query: text.trim().to_string(),
            })),
            "time" => Some(Ok(ToolRequest::CurrentTime {
                timezone: extract_location(text).unwrap_or_else(|| "UTC".into()),
            })),
            "schedule" | "post" => Some(Ok(ToolRequest::SchedulePost {
                content: text.trim().to_string(),
                at: extract_when(text).unwrap_or_else(|| "now".into()),
            })),
            _ => None,
        }
    }
}

fn location_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The preposition may be any case; the place name must be capitalized
    // so filler words ("in the morning") don't read as locations.
    RE.get_or_init(|| {
        Regex::new(r"\b(?:in|for|at|In|For|At)\s+([A-Z][A-Za-z]*(?:\s+[A-Z][A-Za-z]*)*)").unwrap()
    })
}

fn when_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bat\s+(\d{1,2}(?::\d{2})?\s*(?:am|pm)?)|\b(tomorrow|tonight)\b").unwrap()
    })
}

/// Pull a capitalized place name after "in"/"for"/"at".
fn extract_location(text: &str) -> Option<String> {
    location_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Map asset mentions to canonical ids the price endpoint understands.
fn extract_symbol(text: &str) -> Option<String> {
    const ASSETS: &[(&str, &str)] = &[
        ("bitcoin", "bitcoin"),
        ("btc", "bitcoin"),
        ("ethereum", "ethereum"),
        ("eth", "ethereum"),
        ("solana", "solana"),
        ("sol", "solana"),
        ("near", "near"),
    ];
    let lower = text.to_lowercase();
    ASSETS
        .iter()
        .find(|(mention, _)| {
            lower
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word == *mention)
        })
        .map(|(_, id)| id.to_string())
}

fn extract_when(text: &str) -> Option<String> {
    when_re().captures(text).map(|c| {
        c.get(1)
            .or_else(|| c.get(2))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    })
}

/// Maps intent labels to executable tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Plan the tool calls for a turn: one request per matched label that
    /// maps to a registered tool. Labels without a mapping are skipped;
    /// parameter-extraction failures are returned so the invoker can
    /// record them as failed invocations.
    pub fn plan(&self, labels: &[String], text: &str) -> Vec<Result<ToolRequest, ToolError>> {
        let mut seen = Vec::new();
        let mut planned = Vec::new();
        for label in labels {
            let Some(request) = ToolRequest::from_label(label, text) else {
                continue;
            };
            let name = match &request {
                Ok(req) => req.tool_name().to_string(),
                Err(_) => label.clone(),
            };
            // One invocation per tool per turn even if several labels map
            // to the same variant.
            if seen.contains(&name) {
                continue;
            }
            if matches!(&request, Ok(req) if self.get(req.tool_name()).is_none()) {
                continue;
            }
            seen.push(name);
            planned.push(request);
        }
        planned
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
