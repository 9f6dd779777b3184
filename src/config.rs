//! Runtime configuration
//!
//! HTTP endpoints for the catalog and metric sources, plus the integration-wide
//! settings shared by every configuration flow.

use crate::error::{AppError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const COINGECKO_API: &str = "https://api.coingecko.com/api/v3";
pub const MEMPOOL_SPACE_API: &str = "https://mempool.space/api";
pub const CKPOOL_API: &str = "https://solo.ckpool.org";

/// Default minimum time between catalog price requests, in minutes
pub const DEFAULT_MIN_TIME_BETWEEN_REQUESTS: f64 = 0.25;

/// Longest update or request interval accepted, in minutes (one year)
pub const MAX_INTERVAL_MINUTES: f64 = 525_600.0;

/// Convert an interval in minutes to a `Duration`
pub fn minutes_to_duration(minutes: f64) -> Result<Duration> {
    if !(minutes.is_finite() && minutes > 0.0) {
        return Err(AppError::Validation(format!("Interval must be positive: {}", minutes)));
    }
    if minutes > MAX_INTERVAL_MINUTES {
        return Err(AppError::Validation(format!(
            "Interval of {} minutes exceeds {} minutes",
            minutes, MAX_INTERVAL_MINUTES
        )));
    }
    Duration::try_from_secs_f64(minutes * 60.0)
        .map_err(|e| AppError::Validation(format!("Invalid interval of {} minutes: {}", minutes, e)))
}

/// Endpoint configuration for the outbound HTTP clients
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub coingecko_base_url: String,
    pub mempool_base_url: String,
    pub ckpool_base_url: String,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            coingecko_base_url: COINGECKO_API.to_string(),
            mempool_base_url: MEMPOOL_SPACE_API.to_string(),
            ckpool_base_url: CKPOOL_API.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Build from `CRYPTOINFO_*` environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("CRYPTOINFO_COINGECKO_URL") {
            config.coingecko_base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(url) = std::env::var("CRYPTOINFO_MEMPOOL_URL") {
            config.mempool_base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(url) = std::env::var("CRYPTOINFO_CKPOOL_URL") {
            config.ckpool_base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(secs) = std::env::var("CRYPTOINFO_HTTP_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                AppError::Config(format!("Invalid CRYPTOINFO_HTTP_TIMEOUT_SECS: {}", secs))
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Build a reqwest client with the configured timeout
    pub fn http_client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()?)
    }
}

/// Settings that apply to the whole integration rather than a single record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationSettings {
    /// Minutes to wait between two catalog price requests
    pub min_time_between_requests: f64,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            min_time_between_requests: DEFAULT_MIN_TIME_BETWEEN_REQUESTS,
        }
    }
}

/// Integration settings handed to every flow and the refresh scheduler
pub type SharedSettings = Arc<RwLock<IntegrationSettings>>;

pub fn shared_settings(settings: IntegrationSettings) -> SharedSettings {
    Arc::new(RwLock::new(settings))
}
