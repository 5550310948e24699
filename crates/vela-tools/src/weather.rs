//! Current-conditions lookup via an Open-Meteo-compatible endpoint.
//!
//! Geocodes the location name first, then fetches current temperature,
//! humidity, and wind for the coordinates.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{Tool, ToolError};

const GEOCODE_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

pub struct WeatherTool {
    forecast_endpoint: String,
    geocode_endpoint: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    results: Option<Vec<GeocodeHit>>,
}

#[derive(Debug, Deserialize)]
struct GeocodeHit {
    latitude: f64,
    longitude: f64,
    name: String,
}

impl WeatherTool {
    pub fn new(forecast_endpoint: impl Into<String>) -> Self {
        Self {
            forecast_endpoint: forecast_endpoint.into(),
            geocode_endpoint: GEOCODE_URL.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_geocode_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.geocode_endpoint = endpoint.into();
        self
    }

    async fn geocode(&self, location: &str) -> Result<GeocodeHit, ToolError> {
        let response = self
            .http
            .get(&self.geocode_endpoint)
            .query(&[("name", location), ("count", "1")])
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ToolError::Rejected(format!(
                "geocoding returned HTTP {}",
                response.status()
            )));
        }

        let parsed: GeocodeResponse = response
            .json()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        parsed
            .results
            .and_then(|mut hits| if hits.is_empty() { None } else { Some(hits.remove(0)) })
            .ok_or_else(|| ToolError::Rejected(format!("could not geocode location: {location}")))
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather"
    }

    async fn run(&self, params: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let location = params["location"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidParams("missing location".into()))?;

        let hit = self.geocode(location).await?;
        debug!(location = %hit.name, lat = hit.latitude, lon = hit.longitude, "weather lookup");

        let response = self
            .http
            .get(&self.forecast_endpoint)
            .query(&[
                ("latitude", hit.latitude.to_string()),
                ("longitude", hit.longitude.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,wind_speed_10m".to_string(),
                ),
            ])
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ToolError::Rejected(format!(
                "forecast returned HTTP {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;
        let current = &body["current"];

        Ok(serde_json::json!({
            "location": hit.name,
            "temperature_c": current["temperature_2m"],
            "humidity_percent": current["relative_humidity_2m"],
            "wind_kmh": current["wind_speed_10m"],
        }))
    }
}
