//! Minimum spacing between catalog price requests
//!
//! Every price source shares one throttle. The interval is read from the shared
//! integration settings on each check, so a flow that changes
//! `min_time_between_requests` takes effect on the next request.

use crate::config::{minutes_to_duration, SharedSettings, MAX_INTERVAL_MINUTES};
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Enforces a minimum delay between two requests
#[derive(Debug)]
pub struct RequestThrottle {
    settings: SharedSettings,
    last_request: Mutex<Option<Instant>>,
}

impl RequestThrottle {
    pub fn new(settings: SharedSettings) -> Self {
        Self {
            settings,
            last_request: Mutex::new(None),
        }
    }

    /// Configured minimum interval
    pub fn interval(&self) -> Duration {
        let minutes = self.settings.read().min_time_between_requests;
        if !(minutes.is_finite() && minutes > 0.0) {
            return Duration::ZERO;
        }
        minutes_to_duration(minutes.min(MAX_INTERVAL_MINUTES)).unwrap_or_else(|e| {
            warn!("Ignoring request interval: {}", e);
            Duration::ZERO
        })
    }

    /// Returns Ok(()) and records the request if allowed to proceed,
    /// Err(wait_time) if the caller needs to wait
    pub fn check(&self) -> Result<(), Duration> {
        let required_delay = self.interval();
        let mut last_request = self.last_request.lock();

        if let Some(last_time) = *last_request {
            let elapsed = last_time.elapsed();
            if elapsed < required_delay {
                return Err(required_delay - elapsed);
            }
        }

        *last_request = Some(Instant::now());
        Ok(())
    }

    /// Wait until a request is allowed, then record it
    pub async fn wait(&self) {
        while let Err(wait_time) = self.check() {
            debug!("Throttling catalog request for {}ms", wait_time.as_millis());
            tokio::time::sleep(wait_time).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{shared_settings, IntegrationSettings};

    fn throttle(minutes: f64) -> RequestThrottle {
        RequestThrottle::new(shared_settings(IntegrationSettings {
            min_time_between_requests: minutes,
        }))
    }

    #[test]
    fn test_second_request_must_wait() {
        let throttle = throttle(0.5);

        assert!(throttle.check().is_ok());

        let result = throttle.check();
        assert!(result.is_err());
        if let Err(wait_time) = result {
            assert!(wait_time.as_secs_f64() <= 30.0);
        }
    }

    #[test]
    fn test_interval_follows_settings() {
        let throttle = throttle(0.25);
        assert_eq!(throttle.interval(), Duration::from_secs(15));

        throttle.settings.write().min_time_between_requests = 1.0;
        assert_eq!(throttle.interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_oversized_interval_is_capped() {
        let throttle = throttle(1e300);
        assert_eq!(
            throttle.interval(),
            Duration::from_secs_f64(MAX_INTERVAL_MINUTES * 60.0)
        );
        assert!(throttle.check().is_ok());
        assert!(throttle.check().is_err());
    }

    #[tokio::test]
    async fn test_zero_interval_never_waits() {
        let throttle = throttle(0.0);
        throttle.wait().await;
        throttle.wait().await;
        assert!(throttle.check().is_ok());
    }
}
