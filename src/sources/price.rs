//! Catalog prices for a price record

use crate::catalog::coingecko::MarketData;
use crate::catalog::CoinGeckoClient;
use crate::db::sqlite::models::PriceConfig;
use crate::error::Result;
use crate::scheduler::RequestThrottle;
use crate::sources::{MetricSource, Snapshot};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// Multiplier as a number; anything non-numeric counts as 1
pub fn multiplier_value(raw: &str) -> f64 {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(1.0)
}

/// Build a price snapshot from market rows for `pairs` of (item id, multiplier)
pub fn price_snapshot(pairs: &[(String, String)], rows: &[MarketData]) -> Snapshot {
    let mut snapshot = Snapshot::new();

    for (item_id, multiplier) in pairs {
        let Some(row) = rows.iter().find(|row| &row.id == item_id) else {
            warn!("No market data for {}", item_id);
            continue;
        };

        let base_price = row.current_price.unwrap_or(0.0);
        snapshot.insert(item_id.clone(), json!(base_price * multiplier_value(multiplier)));
        snapshot.insert(format!("{}_base_price", item_id), json!(base_price));
        snapshot.insert(format!("{}_market_cap", item_id), json!(row.market_cap));
        snapshot.insert(
            format!("{}_24h_change", item_id),
            json!(row.price_change_percentage_24h),
        );
    }

    snapshot
}

/// Prices of the items of one record
pub struct PriceSource {
    client: Arc<CoinGeckoClient>,
    throttle: Arc<RequestThrottle>,
    config: PriceConfig,
}

impl PriceSource {
    pub fn new(client: Arc<CoinGeckoClient>, throttle: Arc<RequestThrottle>, config: PriceConfig) -> Self {
        Self {
            client,
            throttle,
            config,
        }
    }
}

#[async_trait]
impl MetricSource for PriceSource {
    fn name(&self) -> &str {
        "price"
    }

    async fn fetch(&self) -> Result<Snapshot> {
        let ids = self.config.item_ids();
        self.throttle.wait().await;

        let rows = self.client.markets(&ids, &self.config.currency_name).await?;
        debug!(
            "Fetched {} of {} prices in {}",
            rows.len(),
            ids.len(),
            self.config.currency_name
        );

        Ok(price_snapshot(&self.config.pairs(), &rows))
    }
}
