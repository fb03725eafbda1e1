//! Timeout and bounded retry around a single upstream call.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use geoproxy_core::{Settings, UpstreamError};
use tracing::{debug, warn};

/// Errors that can represent an attempt cut short by the deadline.
pub trait TimeoutError {
    /// Builds the error reported when an attempt exceeds `after`.
    fn timed_out(after: Duration) -> Self;
}

impl TimeoutError for UpstreamError {
    fn timed_out(after: Duration) -> Self {
        UpstreamError::Timeout {
            millis: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Runs an operation under a per-attempt deadline, retrying a bounded
/// number of times with a fixed pause between attempts.
///
/// At most `attempts` invocations happen. The worst-case latency is
/// `attempts * timeout + (attempts - 1) * delay`. An attempt that hits the
/// deadline is dropped and its result is never observed.
///
/// `ResilientCall` never invents a value: once the last attempt fails the
/// last error is returned to the caller.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use geoproxy_core::UpstreamError;
/// use geoproxy_traffic::ResilientCall;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let call = ResilientCall::builder()
///     .timeout(Duration::from_millis(50))
///     .attempts(2)
///     .delay(Duration::from_millis(1))
///     .build();
///
/// let value: Result<u8, UpstreamError> = call.invoke(|| async { Ok(7) }).await;
/// assert_eq!(value, Ok(7));
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResilientCall {
    timeout: Duration,
    attempts: u32,
    delay: Duration,
}

impl Default for ResilientCall {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(3000),
            attempts: 2,
            delay: Duration::from_millis(200),
        }
    }
}

impl ResilientCall {
    /// Creates a builder starting from the defaults (3s, 2 attempts, 200ms).
    pub fn builder() -> ResilientCallBuilder {
        ResilientCallBuilder::default()
    }

    /// Policy from the `UPSTREAM_*` settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::builder()
            .timeout(settings.upstream_timeout())
            .attempts(settings.upstream_attempts())
            .delay(settings.upstream_retry_delay())
            .build()
    }

    /// Returns the per-attempt deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the maximum number of invocations.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns the pause between attempts.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Upper bound on the time [`invoke`](Self::invoke) can take.
    /// Saturates at [`Duration::MAX`].
    pub fn max_elapsed(&self) -> Duration {
        let attempts = self.attempts.max(1);
        self.timeout
            .checked_mul(attempts)
            .and_then(|total| total.checked_add(self.delay.checked_mul(attempts - 1)?))
            .unwrap_or(Duration::MAX)
    }

    /// Runs `operation` until it succeeds or the attempts run out.
    ///
    /// `operation` is called once per attempt and must build a fresh future
    /// each time.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt. An attempt that exceeds the
    /// deadline fails with `E::timed_out(timeout)`.
    pub async fn invoke<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: TimeoutError + Display,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            let outcome = match tokio::time::timeout(self.timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(E::timed_out(self.timeout)),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Upstream call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if attempt < attempts => {
                    warn!(attempt, attempts, error = %err, "Upstream attempt failed, retrying");
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(attempts, error = %err, "Upstream call failed");
                    return Err(err);
                }
            }
        }
    }
}

/// Builder for [`ResilientCall`].
#[derive(Debug, Default)]
pub struct ResilientCallBuilder {
    timeout: Option<Duration>,
    attempts: Option<u32>,
    delay: Option<Duration>,
}

impl ResilientCallBuilder {
    /// Sets the per-attempt deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the maximum number of invocations. Zero is treated as one.
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    /// Sets the pause between attempts.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Builds the policy.
    pub fn build(self) -> ResilientCall {
        let defaults = ResilientCall::default();
        ResilientCall {
            timeout: self.timeout.unwrap_or(defaults.timeout),
            attempts: self.attempts.unwrap_or(defaults.attempts).max(1),
            delay: self.delay.unwrap_or(defaults.delay),
        }
    }
}
