//! Metric sources
//!
//! Each record category is backed by one source that fetches a flat snapshot
//! of named values. The refresh scheduler polls them; the flow never does.

pub mod ckpool;
pub mod mempool;
pub mod price;

use crate::catalog::CoinGeckoClient;
use crate::config::ClientConfig;
use crate::db::sqlite::models::{ConfigEntry, RecordData, SensorType};
use crate::error::{AppError, Result};
use crate::scheduler::RequestThrottle;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use ckpool::CkPoolSource;
pub use mempool::{MempoolClient, MempoolSource, NetworkSource};
pub use price::PriceSource;

/// Named values fetched in one refresh
pub type Snapshot = BTreeMap<String, serde_json::Value>;

/// Trait that all metric sources implement
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Fetch the current values
    async fn fetch(&self) -> Result<Snapshot>;
}

/// Resolves the source that serves a record
pub trait SourceProvider: Send + Sync {
    fn source_for(&self, entry: &ConfigEntry) -> Result<Arc<dyn MetricSource>>;
}

/// Builds the source for a record, sharing HTTP clients between records
pub struct SourceFactory {
    coingecko: Arc<CoinGeckoClient>,
    mempool: Arc<MempoolClient>,
    http: reqwest::Client,
    ckpool_base_url: String,
    throttle: Arc<RequestThrottle>,
}

impl SourceFactory {
    pub fn new(config: &ClientConfig, throttle: Arc<RequestThrottle>) -> Result<Self> {
        let http = config.http_client()?;
        Ok(Self {
            coingecko: Arc::new(CoinGeckoClient::new(config)?),
            mempool: Arc::new(MempoolClient::new(http.clone(), &config.mempool_base_url)),
            http,
            ckpool_base_url: config.ckpool_base_url.clone(),
            throttle,
        })
    }
}

impl SourceProvider for SourceFactory {
    fn source_for(&self, entry: &ConfigEntry) -> Result<Arc<dyn MetricSource>> {
        let source: Arc<dyn MetricSource> = match &entry.data {
            RecordData::Price(config) => Arc::new(PriceSource::new(
                self.coingecko.clone(),
                self.throttle.clone(),
                config.clone(),
            )),
            RecordData::Mining(config) => match config.sensor_type {
                SensorType::BtcNetwork => Arc::new(NetworkSource::new(self.mempool.clone())),
                SensorType::BtcMempool => Arc::new(MempoolSource::new(self.mempool.clone())),
                SensorType::CkpoolMining => {
                    let address = config.btc_address.clone().ok_or_else(|| {
                        AppError::Validation(format!(
                            "Entry {} has no BTC address",
                            entry.entry_id
                        ))
                    })?;
                    Arc::new(CkPoolSource::new(
                        self.http.clone(),
                        &self.ckpool_base_url,
                        address,
                    ))
                }
                SensorType::Price => {
                    return Err(AppError::Internal(format!(
                        "Entry {} has mining data with a price category",
                        entry.entry_id
                    )))
                }
            },
        };
        Ok(source)
    }
}
