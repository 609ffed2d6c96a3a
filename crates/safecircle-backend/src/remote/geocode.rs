use std::time::Duration;

use async_trait::async_trait;
use safecircle_bridge::{config::GeocodingConfig, incident::GeoPosition};
use serde::Deserialize;

use super::{GeocodeError, Geocoder};

/// Shown when a lookup succeeds but yields nothing.
pub const UNKNOWN_LOCATION: &str = "Unknown location";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    results: Vec<ReverseResult>,
}

#[derive(Debug, Deserialize)]
struct ReverseResult {
    formatted: Option<String>,
}

/// Reverse geocoder speaking the OpenCage JSON API.
#[derive(Debug, Clone)]
pub struct OpenCageGeocoder {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenCageGeocoder {
    /// Returns `None` when no API key is configured.
    pub fn from_config(config: &GeocodingConfig) -> Result<Option<Self>, GeocodeError> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Some(Self {
            endpoint: config.endpoint.clone(),
            api_key,
            client,
        }))
    }
}

#[async_trait]
impl Geocoder for OpenCageGeocoder {
    async fn reverse(&self, position: GeoPosition) -> Result<String, GeocodeError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query(position)),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }
        Ok(formatted_address(response.json().await?))
    }
}

fn query(position: GeoPosition) -> String {
    format!("{}+{}", position.latitude, position.longitude)
}

fn formatted_address(response: ReverseResponse) -> String {
    response
        .results
        .into_iter()
        .next()
        .and_then(|result| result.formatted)
        .unwrap_or_else(|| UNKNOWN_LOCATION.to_string())
}
