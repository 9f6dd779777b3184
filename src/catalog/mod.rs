//! Catalog adapters
//!
//! The catalog is the external list of trackable items (cryptocurrencies).
//! Configuration flows use it to offer candidates and to validate ids.

pub mod coingecko;

use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

pub use coingecko::CoinGeckoClient;

/// Maximum number of matches returned by a free-text catalog search
pub const SEARCH_LIMIT: usize = 100;

/// Number of items offered when no search query is given
pub const TOP_LIMIT: usize = 10;

/// One entry of the external catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub symbol: String,
}

impl CatalogItem {
    pub fn new(id: &str, name: &str, symbol: &str) -> Self {
        Self {
            id: id.trim().to_lowercase(),
            name: name.to_string(),
            symbol: symbol.to_string(),
        }
    }

    /// Display label, e.g. "Bitcoin (BTC)"
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.symbol.to_uppercase())
    }

    /// Case-insensitive substring match against id, name and symbol.
    /// `query_lower` must already be lower-cased.
    pub fn matches(&self, query_lower: &str) -> bool {
        self.id.to_lowercase().contains(query_lower)
            || self.name.to_lowercase().contains(query_lower)
            || self.symbol.to_lowercase().contains(query_lower)
    }
}

/// Catalog trait that all catalog backends must implement
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Full list of known items
    async fn list_all(&self) -> Result<Vec<CatalogItem>>;

    /// Top `n` items by market cap
    async fn list_top(&self, n: usize) -> Result<Vec<CatalogItem>>;

    /// Which of `ids` exist in the catalog.
    ///
    /// Fails open: when the catalog cannot be listed every id is reported valid.
    async fn validate(&self, ids: &[String]) -> Result<HashMap<String, bool>> {
        let items = match self.list_all().await {
            Ok(items) if !items.is_empty() => items,
            Ok(_) => return Ok(all_valid(ids)),
            Err(e) => {
                tracing::warn!("Catalog unavailable, accepting ids unchecked: {}", e);
                return Ok(all_valid(ids));
            }
        };

        let known: HashSet<String> = items.into_iter().map(|item| item.id.to_lowercase()).collect();
        Ok(ids
            .iter()
            .map(|id| (id.clone(), known.contains(&id.to_lowercase())))
            .collect())
    }

    /// Items whose id, name or symbol contains `query`
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<CatalogItem>> {
        let query_lower = query.to_lowercase();
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|item| item.matches(&query_lower))
            .take(limit)
            .collect())
    }
}

pub(crate) fn all_valid(ids: &[String]) -> HashMap<String, bool> {
    ids.iter().map(|id| (id.clone(), true)).collect()
}

/// Fixed top-10 list used when the ranking endpoint is unreachable
pub fn fallback_top(n: usize) -> Vec<CatalogItem> {
    const TOP: [(&str, &str, &str); 10] = [
        ("bitcoin", "Bitcoin", "btc"),
        ("ethereum", "Ethereum", "eth"),
        ("tether", "Tether", "usdt"),
        ("binancecoin", "BNB", "bnb"),
        ("solana", "Solana", "sol"),
        ("ripple", "XRP", "xrp"),
        ("usd-coin", "USDC", "usdc"),
        ("cardano", "Cardano", "ada"),
        ("dogecoin", "Dogecoin", "doge"),
        ("tron", "TRON", "trx"),
    ];

    TOP.iter()
        .take(n)
        .map(|(id, name, symbol)| CatalogItem::new(id, name, symbol))
        .collect()
}

/// In-memory catalog.
///
/// Serves a fixed item list; useful offline and as a stand-in for the remote
/// catalog. `unavailable()` builds one whose every call fails.
pub struct StaticCatalog {
    items: Vec<CatalogItem>,
    top: Option<Vec<CatalogItem>>,
    available: bool,
    list_calls: AtomicUsize,
}

impl StaticCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self {
            items,
            top: None,
            available: true,
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Use an explicit ranking instead of the first items of the list
    pub fn with_top(mut self, top: Vec<CatalogItem>) -> Self {
        self.top = Some(top);
        self
    }

    pub fn unavailable() -> Self {
        Self {
            items: Vec::new(),
            top: None,
            available: false,
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Number of `list_all` calls served so far
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogService for StaticCatalog {
    async fn list_all(&self) -> Result<Vec<CatalogItem>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(AppError::Upstream("catalog unavailable".to_string()));
        }
        Ok(self.items.clone())
    }

    async fn list_top(&self, n: usize) -> Result<Vec<CatalogItem>> {
        if !self.available {
            return Err(AppError::Upstream("catalog unavailable".to_string()));
        }
        let ranked = self.top.as_ref().unwrap_or(&self.items);
        Ok(ranked.iter().take(n).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<CatalogItem> {
        vec![
            CatalogItem::new("bitcoin", "Bitcoin", "btc"),
            CatalogItem::new("bitcoin-cash", "Bitcoin Cash", "bch"),
            CatalogItem::new("ethereum", "Ethereum", "eth"),
        ]
    }

    #[test]
    fn test_item_label_and_matching() {
        let item = CatalogItem::new(" Bitcoin ", "Bitcoin", "btc");
        assert_eq!(item.id, "bitcoin");
        assert_eq!(item.label(), "Bitcoin (BTC)");
        assert!(item.matches("btc"));
        assert!(item.matches("itco"));
        assert!(!item.matches("eth"));
    }

    #[test]
    fn test_fallback_top() {
        let top = fallback_top(10);
        assert_eq!(top.len(), 10);
        assert_eq!(top[0].id, "bitcoin");
        assert_eq!(fallback_top(3).len(), 3);
    }

    #[tokio::test]
    async fn test_validate_reports_unknown_ids() {
        let catalog = StaticCatalog::new(sample());
        let ids = vec!["bitcoin".to_string(), "notacoin".to_string()];

        let result = catalog.validate(&ids).await.unwrap();
        assert_eq!(result.get("bitcoin"), Some(&true));
        assert_eq!(result.get("notacoin"), Some(&false));
    }

    #[tokio::test]
    async fn test_validate_fails_open_when_unavailable() {
        let catalog = StaticCatalog::unavailable();
        let ids = vec!["anything".to_string()];

        let result = catalog.validate(&ids).await.unwrap();
        assert_eq!(result.get("anything"), Some(&true));
    }

    #[tokio::test]
    async fn test_search_matches_symbol_and_name() {
        let catalog = StaticCatalog::new(sample());

        let by_symbol = catalog.search("BCH", SEARCH_LIMIT).await.unwrap();
        assert_eq!(by_symbol.len(), 1);
        assert_eq!(by_symbol[0].id, "bitcoin-cash");

        let by_name = catalog.search("bitcoin", 1).await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, "bitcoin");
    }
}
