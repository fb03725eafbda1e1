//! TomTom flow-segment provider.

use async_trait::async_trait;
use geoproxy_core::UpstreamError;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{Coordinates, TrafficProvider, TrafficReading};

const DEFAULT_BASE_URL: &str = "https://api.tomtom.com";
const FLOW_SEGMENT_PATH: &str = "/traffic/services/4/flowSegmentData/absolute/10/json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowResponse {
    flow_segment_data: FlowSegmentData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowSegmentData {
    current_speed: f64,
    free_flow_speed: f64,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    road_closure: bool,
}

/// Calls the TomTom flow-segment API over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpTrafficProvider {
    client: Client,
    base_url: String,
}

impl Default for HttpTrafficProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTrafficProvider {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Provider against a different host (proxies, test servers).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, point: Coordinates) -> String {
        format!(
            "{}{}?point={},{}",
            self.base_url, FLOW_SEGMENT_PATH, point.lat, point.lng
        )
    }

    /// Converts a flow-segment payload into a reading.
    ///
    /// Congestion is `1 - currentSpeed / freeFlowSpeed` as a percentage,
    /// clamped to 0..=100. A closed road is 100.
    fn parse_payload(body: &[u8]) -> Result<TrafficReading, UpstreamError> {
        let payload: FlowResponse =
            serde_json::from_slice(body).map_err(|e| UpstreamError::parse(e.to_string()))?;
        let segment = payload.flow_segment_data;

        if !segment.free_flow_speed.is_finite() || segment.free_flow_speed <= 0.0 {
            return Err(UpstreamError::parse(format!(
                "freeFlowSpeed must be positive, got {}",
                segment.free_flow_speed
            )));
        }

        let congestion = if segment.road_closure {
            100
        } else {
            let ratio = 1.0 - segment.current_speed / segment.free_flow_speed;
            (ratio * 100.0).round().clamp(0.0, 100.0) as u8
        };

        Ok(TrafficReading {
            provider: "tomtom".to_string(),
            congestion,
            current_speed: Some(segment.current_speed),
            free_flow_speed: Some(segment.free_flow_speed),
            confidence: segment.confidence,
        })
    }
}

#[async_trait]
impl TrafficProvider for HttpTrafficProvider {
    fn name(&self) -> &str {
        "tomtom"
    }

    async fn fetch(
        &self,
        point: Coordinates,
        api_key: Option<&str>,
    ) -> Result<TrafficReading, UpstreamError> {
        let api_key = api_key.ok_or_else(|| UpstreamError::missing_credentials(self.name()))?;

        debug!(lat = point.lat, lng = point.lng, "Fetching TomTom flow segment");
        let response = self
            .client
            .get(self.url(point))
            .query(&[("key", api_key)])
            .send()
            .await
            .map_err(|e| UpstreamError::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Http {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::transport(e.to_string()))?;

        Self::parse_payload(&body)
    }
}
