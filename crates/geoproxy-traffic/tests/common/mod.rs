#![allow(dead_code)]
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use geoproxy_cache::{CacheConfig, ManualClock, StoreSelection, TieredCache};
use geoproxy_core::UpstreamError;
use geoproxy_traffic::{
    Coordinates, DegradingFetchAdapter, ResilientCall, StaticCredentials, TRAFFIC_NAMESPACE,
    TrafficProvider, TrafficReading,
};

pub const PROVIDER: &str = "scripted";
pub const API_KEY: &str = "test-key";

/// One scripted provider response.
#[derive(Debug, Clone)]
pub enum Step {
    Reading(u8),
    Fail(UpstreamError),
    Hang,
}

/// Provider that replays a fixed list of responses and counts calls.
/// Once the script runs out every call fails with a transport error.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicU32,
}

impl ScriptedProvider {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrafficProvider for ScriptedProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch(
        &self,
        _point: Coordinates,
        api_key: Option<&str>,
    ) -> Result<TrafficReading, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(api_key, Some(API_KEY), "provider called without the configured key");

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reading(congestion)) => Ok(TrafficReading::new(PROVIDER, congestion)),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(TrafficReading::new(PROVIDER, 0))
            },
            None => Err(UpstreamError::transport("script exhausted")),
        }
    }
}

/// Test policy: 100ms deadline, 2 attempts, 10ms between them.
pub fn fast_call() -> ResilientCall {
    ResilientCall::builder()
        .timeout(Duration::from_millis(100))
        .attempts(2)
        .delay(Duration::from_millis(10))
        .build()
}

/// Adapter over `provider` with its key configured, on `cache`.
pub fn with_cache(provider: Arc<ScriptedProvider>, cache: Arc<TieredCache>) -> DegradingFetchAdapter {
    DegradingFetchAdapter::new(
        cache,
        provider,
        Arc::new(StaticCredentials::empty().with_key(PROVIDER, API_KEY)),
    )
    .with_call(fast_call())
    .with_ttl(Duration::from_secs(300))
}

/// Adapter over `provider` with an in-process cache on a manual clock.
pub fn adapter(provider: Arc<ScriptedProvider>) -> (DegradingFetchAdapter, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let cache = Arc::new(TieredCache::new(
        TRAFFIC_NAMESPACE,
        StoreSelection::local("test"),
        CacheConfig::default(),
        clock.clone(),
    ));
    (with_cache(provider, cache), clock)
}
