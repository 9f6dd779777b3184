//! CoinGecko catalog adapter

use crate::catalog::{fallback_top, CatalogItem, CatalogService};
use crate::config::ClientConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

/// CoinGecko REST client
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
}

/// Market data row from `/coins/markets`
#[derive(Debug, Clone, Deserialize)]
pub struct MarketData {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_rank: Option<u32>,
    pub total_volume: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub ath: Option<f64>,
    pub image: Option<String>,
}

#[derive(Deserialize)]
struct CoinListEntry {
    id: String,
    name: String,
    symbol: String,
}

impl CoinGeckoClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            client: config.http_client()?,
            base_url: config.coingecko_base_url.clone(),
        })
    }

    /// Market rows for `ids`, priced in `currency`
    pub async fn markets(&self, ids: &[String], currency: &str) -> Result<Vec<MarketData>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/coins/markets?vs_currency={}&ids={}&price_change_percentage=24h",
            self.base_url,
            urlencoding::encode(&currency.to_lowercase()),
            urlencoding::encode(&ids.join(",")),
        );

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let rows: Vec<MarketData> = response.json().await?;

        debug!("CoinGecko returned {} market rows", rows.len());
        Ok(rows)
    }

    async fn fetch_top(&self, n: usize) -> Result<Vec<CatalogItem>> {
        let url = format!(
            "{}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page={}&page=1",
            self.base_url, n
        );

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let rows: Vec<MarketData> = response.json().await?;

        Ok(rows
            .into_iter()
            .map(|row| CatalogItem::new(&row.id, &row.name, &row.symbol))
            .collect())
    }
}

#[async_trait]
impl CatalogService for CoinGeckoClient {
    async fn list_all(&self) -> Result<Vec<CatalogItem>> {
        let url = format!("{}/coins/list", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("CoinGecko coin list: {}", e)))?;

        let entries: Vec<CoinListEntry> = response.json().await?;
        debug!("CoinGecko coin list has {} entries", entries.len());

        Ok(entries
            .into_iter()
            .map(|entry| CatalogItem::new(&entry.id, &entry.name, &entry.symbol))
            .collect())
    }

    async fn list_top(&self, n: usize) -> Result<Vec<CatalogItem>> {
        match self.fetch_top(n).await {
            Ok(items) if !items.is_empty() => Ok(items),
            Ok(_) => {
                warn!("CoinGecko returned no market rows, using fallback top list");
                Ok(fallback_top(n))
            }
            Err(e) => {
                warn!("Error fetching top cryptocurrencies, using fallback list: {}", e);
                Ok(fallback_top(n))
            }
        }
    }
}
