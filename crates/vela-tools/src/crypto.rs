//! Spot price lookup via a CoinGecko-compatible endpoint.

use async_trait::async_trait;

use crate::{Tool, ToolError};

pub struct CryptoPriceTool {
    endpoint: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl CryptoPriceTool {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[async_trait]
impl Tool for CryptoPriceTool {
    fn name(&self) -> &str {
        "crypto_price"
    }

    async fn run(&self, params: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let symbol = params["symbol"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("missing symbol".into()))?;

        let url = format!("{}/simple/price", self.endpoint.trim_end_matches('/'));
        let mut request = self.http.get(url).query(&[
            ("ids", symbol),
            ("vs_currencies", "usd"),
            ("include_24hr_change", "true"),
        ]);
        if let Some(ref key) = self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ToolError::Rejected(format!(
                "price endpoint returned HTTP {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        let quote = &body[symbol];
        if quote.is_null() {
            return Err(ToolError::Rejected(format!("no quote for asset: {symbol}")));
        }

        Ok(serde_json::json!({
            "asset": symbol,
            "usd": quote["usd"],
            "change_24h_percent": quote["usd_24h_change"],
        }))
    }
}
