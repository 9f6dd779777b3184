//! Bitcoin network and mempool statistics from mempool.space

use crate::error::{AppError, Result};
use crate::sources::{MetricSource, Snapshot};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Blocks between two subsidy halvings
pub const HALVING_INTERVAL: u64 = 210_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HashrateResponse {
    #[serde(default)]
    current_hashrate: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DifficultyAdjustment {
    #[serde(default)]
    difficulty: f64,
    #[serde(default)]
    next_retarget_height: u64,
    #[serde(default)]
    remaining_blocks: u64,
    #[serde(default)]
    difficulty_change: f64,
}

#[derive(Debug, Deserialize)]
struct MempoolInfo {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    vsize: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendedFees {
    #[serde(default)]
    fastest_fee: f64,
    #[serde(default)]
    half_hour_fee: f64,
    #[serde(default)]
    hour_fee: f64,
    #[serde(default)]
    economy_fee: f64,
    #[serde(default)]
    minimum_fee: f64,
}

/// (next halving height, blocks until it)
pub fn halving_info(height: u64) -> (u64, u64) {
    let next = (height / HALVING_INTERVAL + 1) * HALVING_INTERVAL;
    (next, next - height)
}

/// mempool.space REST client
pub struct MempoolClient {
    client: Client,
    base_url: String,
}

impl MempoolClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("mempool.space {}: {}", path, e)))?;
        Ok(response.json().await?)
    }

    async fn tip_height(&self) -> Result<u64> {
        let url = format!("{}/blocks/tip/height", self.base_url);
        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("mempool.space tip height: {}", e)))?
            .text()
            .await?;

        body.trim()
            .parse()
            .map_err(|_| AppError::Upstream(format!("Invalid block height: {}", body)))
    }

    /// Hashrate, difficulty and halving schedule
    pub async fn network_stats(&self) -> Result<Snapshot> {
        let hashrate: HashrateResponse = self.get_json("/v1/mining/hashrate/3d").await?;
        let height = self.tip_height().await?;
        let difficulty: DifficultyAdjustment = self.get_json("/v1/difficulty-adjustment").await?;

        let (next_halving, blocks_until_halving) = halving_info(height);
        debug!("Bitcoin tip height {}, next halving at {}", height, next_halving);

        let mut snapshot = Snapshot::new();
        // EH/s
        snapshot.insert("hashrate".into(), json!(hashrate.current_hashrate / 1e18));
        snapshot.insert("difficulty".into(), json!(difficulty.difficulty));
        snapshot.insert("block_height".into(), json!(height));
        snapshot.insert("next_difficulty_block".into(), json!(difficulty.next_retarget_height));
        snapshot.insert("blocks_until_retarget".into(), json!(difficulty.remaining_blocks));
        snapshot.insert("difficulty_change".into(), json!(difficulty.difficulty_change));
        snapshot.insert("next_halving_block".into(), json!(next_halving));
        snapshot.insert("blocks_until_halving".into(), json!(blocks_until_halving));
        Ok(snapshot)
    }

    /// Mempool size and recommended fees
    pub async fn mempool_stats(&self) -> Result<Snapshot> {
        let mempool: MempoolInfo = self.get_json("/mempool").await?;
        let fees: RecommendedFees = self.get_json("/v1/fees/recommended").await?;

        let mut snapshot = Snapshot::new();
        snapshot.insert("mempool_size".into(), json!(mempool.count));
        // MB
        snapshot.insert("mempool_bytes".into(), json!(mempool.vsize as f64 / 1_000_000.0));
        snapshot.insert("fee_fastest".into(), json!(fees.fastest_fee));
        snapshot.insert("fee_half_hour".into(), json!(fees.half_hour_fee));
        snapshot.insert("fee_hour".into(), json!(fees.hour_fee));
        snapshot.insert("fee_economy".into(), json!(fees.economy_fee));
        snapshot.insert("fee_minimum".into(), json!(fees.minimum_fee));
        Ok(snapshot)
    }
}

/// Network-wide statistics
pub struct NetworkSource {
    client: Arc<MempoolClient>,
}

impl NetworkSource {
    pub fn new(client: Arc<MempoolClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetricSource for NetworkSource {
    fn name(&self) -> &str {
        "btc_network"
    }

    async fn fetch(&self) -> Result<Snapshot> {
        self.client.network_stats().await
    }
}

/// Mempool statistics
pub struct MempoolSource {
    client: Arc<MempoolClient>,
}

impl MempoolSource {
    pub fn new(client: Arc<MempoolClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetricSource for MempoolSource {
    fn name(&self) -> &str {
        "btc_mempool"
    }

    async fn fetch(&self) -> Result<Snapshot> {
        self.client.mempool_stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halving_info() {
        assert_eq!(halving_info(0), (210_000, 210_000));
        assert_eq!(halving_info(840_000), (1_050_000, 210_000));
        assert_eq!(halving_info(870_123), (1_050_000, 179_877));
        assert_eq!(halving_info(1_049_999), (1_050_000, 1));
    }

    #[test]
    fn test_difficulty_response_parsing() {
        let json = r#"{"progressPercent":41.2,"difficultyChange":2.35,
            "remainingBlocks":1185,"nextRetargetHeight":880992}"#;
        let parsed: DifficultyAdjustment = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.remaining_blocks, 1185);
        assert_eq!(parsed.next_retarget_height, 880_992);
        assert_eq!(parsed.difficulty, 0.0);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let client = MempoolClient::new(Client::new(), "http://127.0.0.1:9/");
        assert!(client.mempool_stats().await.is_err());
    }
}
