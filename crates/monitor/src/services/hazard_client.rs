//! HTTP client for the incident API's hazard listing.
//!
//! Reads `GET {base_url}/Products`, a JSON array of incident reports, and
//! keeps the entries that carry an id and coordinates.

use std::time::Duration;

use domain::errors::FetchError;
use domain::models::HazardPoint;
use domain::services::HazardSource;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::HazardsConfig;

/// Path of the hazard listing relative to the API base URL.
const HAZARDS_PATH: &str = "Products";

/// [`HazardSource`] backed by the incident REST API.
pub struct HttpHazardSource {
    client: Client,
    url: String,
    timeout_ms: u64,
}

impl HttpHazardSource {
    /// Create a new client for the configured API.
    pub fn new(config: &HazardsConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: hazards_url(&config.base_url),
            timeout_ms: config.request_timeout_ms,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl HazardSource for HttpHazardSource {
    async fn fetch(&self) -> Result<Vec<HazardPoint>, FetchError> {
        debug!(url = %self.url, "Fetching hazards");

        let response = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout_ms)
            } else {
                FetchError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        parse_hazards(&body)
    }
}

fn hazards_url(base_url: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), HAZARDS_PATH)
}

/// Decode the listing. One malformed entry doesn't discard the rest.
fn parse_hazards(body: &str) -> Result<Vec<HazardPoint>, FetchError> {
    let entries: Vec<serde_json::Value> =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    let total = entries.len();
    let hazards: Vec<HazardPoint> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(hazard) => Some(hazard),
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed hazard entry");
                None
            }
        })
        .collect();

    debug!(total, decoded = hazards.len(), "Decoded hazard listing");
    Ok(hazards)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hazards_url() {
        assert_eq!(
            hazards_url("http://192.168.1.3:7027"),
            "http://192.168.1.3:7027/Products"
        );
        assert_eq!(
            hazards_url("https://api.example.com/v1/"),
            "https://api.example.com/v1/Products"
        );
    }

    #[test]
    fn test_parse_hazards_ignores_extra_fields() {
        let body = r#"[
            {"id": 1, "name": "Dana", "incident": "Pothole", "details": "Deep", "latitude": 40.0, "longitude": -75.0},
            {"id": 2, "latitude": "40.5", "longitude": "-75.5", "reportedBy": "someone"}
        ]"#;

        let hazards = parse_hazards(body).unwrap();
        assert_eq!(hazards.len(), 2);
        assert_eq!(hazards[0].label(), Some("Pothole"));
        assert_eq!(hazards[1].latitude, 40.5);
    }

    #[test]
    fn test_parse_hazards_skips_malformed_entries() {
        let body = r#"[
            {"id": 1, "latitude": 40.0, "longitude": -75.0},
            {"id": 2, "latitude": 40.0},
            {"latitude": 40.0, "longitude": -75.0},
            "not an object"
        ]"#;

        let hazards = parse_hazards(body).unwrap();
        assert_eq!(hazards.len(), 1);
        assert_eq!(hazards[0].id.as_str(), "1");
    }

    #[test]
    fn test_parse_hazards_rejects_non_array() {
        let err = parse_hazards(r#"{"error": "oops"}"#).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn test_new_client() {
        let config = HazardsConfig {
            base_url: "http://localhost:7027/".to_string(),
            request_timeout_ms: 500,
            refresh_interval_secs: 0,
        };
        let source = HttpHazardSource::new(&config).unwrap();
        assert_eq!(source.url(), "http://localhost:7027/Products");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_error() {
        let config = HazardsConfig {
            // Port 9 (discard) on loopback refuses connections.
            base_url: "http://127.0.0.1:9".to_string(),
            request_timeout_ms: 2000,
            refresh_interval_secs: 0,
        };
        let source = HttpHazardSource::new(&config).unwrap();
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Transport(_) | FetchError::Timeout(_)
        ));
    }
}
