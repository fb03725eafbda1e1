use std::ops::RangeInclusive;

use async_trait::async_trait;
use geoproxy_core::UpstreamError;
use rand::Rng;

use super::{Coordinates, TrafficProvider, TrafficReading};

/// Congestion range of synthetic readings.
pub const SYNTHETIC_CONGESTION: RangeInclusive<u8> = 10..=50;

/// Draws a congestion value from [`SYNTHETIC_CONGESTION`].
pub fn synthetic_congestion() -> u8 {
    rand::rng().random_range(SYNTHETIC_CONGESTION)
}

/// Local provider producing random readings. Needs no credentials.
#[derive(Debug, Clone, Default)]
pub struct MockTrafficProvider;

impl MockTrafficProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TrafficProvider for MockTrafficProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn requires_credentials(&self) -> bool {
        false
    }

    fn is_synthetic(&self) -> bool {
        true
    }

    async fn fetch(
        &self,
        _point: Coordinates,
        _api_key: Option<&str>,
    ) -> Result<TrafficReading, UpstreamError> {
        Ok(TrafficReading::new(self.name(), synthetic_congestion()))
    }
}
