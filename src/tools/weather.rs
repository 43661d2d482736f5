//! Weather lookup tool.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::Tool;

const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com";

/// Current-weather lookup against an Open-Meteo compatible endpoint.
#[derive(Debug, Clone)]
pub struct WeatherTool {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct WeatherArgs {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    current: CurrentWeather,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature_2m: f64,
    #[serde(default)]
    wind_speed_10m: Option<f64>,
}

impl WeatherTool {
    /// Create the tool; defaults to the public Open-Meteo endpoint.
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &'static str {
        "get_weather"
    }

    fn description(&self) -> &'static str {
        "Get the current weather at a location given latitude and longitude."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "latitude": { "type": "number" },
                "longitude": { "type": "number" }
            },
            "required": ["latitude", "longitude"]
        })
    }

    async fn execute(&self, arguments: &str) -> anyhow::Result<String> {
        let args: WeatherArgs = serde_json::from_str(arguments)?;

        let url = format!(
            "{}/v1/forecast?latitude={}&longitude={}&current=temperature_2m,wind_speed_10m",
            self.base_url.trim_end_matches('/'),
            args.latitude,
            args.longitude
        );

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body: WeatherResponse = response.json().await?;

        let mut summary = format!("Temperature: {:.1}°C", body.current.temperature_2m);
        if let Some(wind) = body.current.wind_speed_10m {
            summary.push_str(&format!(", wind: {wind:.1} km/h"));
        }
        Ok(summary)
    }
}
