//! CKPool solo mining account statistics

use crate::error::{AppError, Result};
use crate::sources::{MetricSource, Snapshot};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
struct UserStats {
    #[serde(default)]
    hashrate1m: Option<String>,
    #[serde(default)]
    hashrate1hr: Option<String>,
    #[serde(default)]
    hashrate1d: Option<String>,
    #[serde(default)]
    bestshare: Option<Value>,
    #[serde(default)]
    workers: Option<Value>,
}

/// Convert a suffixed hashrate string ("3.12T") to GH/s.
///
/// No suffix means GH/s already; anything unparseable is 0.
pub fn parse_hashrate(raw: &str) -> f64 {
    let raw = raw.trim();
    let Some(last) = raw.chars().last() else {
        return 0.0;
    };

    let (number, unit) = if last.is_ascii_alphabetic() {
        (&raw[..raw.len() - 1], last.to_ascii_uppercase())
    } else {
        (raw, 'G')
    };

    let factor = match unit {
        'K' => 1e-6,
        'M' => 1e-3,
        'G' => 1.0,
        'T' => 1e3,
        'P' => 1e6,
        _ => 1.0,
    };

    number.trim().parse::<f64>().map(|v| v * factor).unwrap_or(0.0)
}

/// JSON number or numeric string as f64
fn as_number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn snapshot_from(stats: &UserStats) -> Snapshot {
    let rate = |value: &Option<String>| parse_hashrate(value.as_deref().unwrap_or("0"));

    let mut snapshot = Snapshot::new();
    snapshot.insert("hashrate".into(), json!(rate(&stats.hashrate1m)));
    snapshot.insert("hashrate_1h".into(), json!(rate(&stats.hashrate1hr)));
    snapshot.insert("hashrate_24h".into(), json!(rate(&stats.hashrate1d)));
    snapshot.insert("best_share".into(), json!(as_number(stats.bestshare.as_ref())));
    snapshot.insert("workers".into(), json!(as_number(stats.workers.as_ref()) as u64));
    snapshot.insert("blocks_found".into(), json!(0));
    snapshot
}

/// Stats of one mining address
pub struct CkPoolSource {
    client: Client,
    base_url: String,
    btc_address: String,
}

impl CkPoolSource {
    pub fn new(client: Client, base_url: &str, btc_address: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            btc_address,
        }
    }
}

#[async_trait]
impl MetricSource for CkPoolSource {
    fn name(&self) -> &str {
        "ckpool_mining"
    }

    async fn fetch(&self) -> Result<Snapshot> {
        let url = format!(
            "{}/users/{}",
            self.base_url,
            urlencoding::encode(&self.btc_address)
        );
        let response = self.client.get(&url).send().await?;

        // no mining history for this address
        if response.status() == StatusCode::NOT_FOUND {
            debug!("No CKPool history for {}", self.btc_address);
            return Ok(snapshot_from(&UserStats::default()));
        }

        let response = response
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("CKPool user stats: {}", e)))?;
        let stats: UserStats = response.json().await?;
        Ok(snapshot_from(&stats))
    }
}
