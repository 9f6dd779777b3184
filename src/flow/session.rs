//! Transient per-flow state

use crate::catalog::{fallback_top, CatalogItem, CatalogService, TOP_LIMIT};
use crate::db::sqlite::models::{ConfigEntry, PriceConfig, RecordData, SensorType};
use crate::flow::form::{ConfigureInput, SourceInput};
use std::sync::Arc;
use tracing::{debug, warn};

/// State carried between the steps of one flow. Never persisted.
#[derive(Debug, Default)]
pub struct WizardSession {
    pub sensor_type: Option<SensorType>,
    pub search_query: String,
    catalog_snapshot: Option<Arc<Vec<CatalogItem>>>,
    pub selection: Vec<String>,
    /// Record being reconfigured
    pub existing: Option<ConfigEntry>,
    /// Last configure submission, reused as defaults after a rejected attempt
    pub last_configure: Option<ConfigureInput>,
    pub last_source: Option<SourceInput>,
}

impl WizardSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_reconfigure(entry: ConfigEntry) -> Self {
        Self {
            sensor_type: Some(entry.data.sensor_type()),
            existing: Some(entry),
            ..Self::default()
        }
    }

    /// Catalog snapshot, fetched on first use and kept for the rest of the session.
    /// A failed fetch is remembered as an empty snapshot.
    pub async fn snapshot(&mut self, catalog: &dyn CatalogService) -> Arc<Vec<CatalogItem>> {
        if let Some(snapshot) = &self.catalog_snapshot {
            return snapshot.clone();
        }

        let items = match catalog.list_all().await {
            Ok(items) => items,
            Err(e) => {
                warn!("Error fetching coin list: {}", e);
                Vec::new()
            }
        };
        debug!("Session catalog snapshot holds {} items", items.len());

        let snapshot = Arc::new(items);
        self.catalog_snapshot = Some(snapshot.clone());
        snapshot
    }

    pub fn has_snapshot(&self) -> bool {
        self.catalog_snapshot.is_some()
    }

    /// Existing catalog record when reconfiguring
    pub fn existing_price(&self) -> Option<&PriceConfig> {
        match self.existing.as_ref().map(|entry| &entry.data) {
            Some(RecordData::Price(config)) => Some(config),
            _ => None,
        }
    }

    /// Ids already configured on the record being reconfigured
    pub fn existing_ids(&self) -> Vec<String> {
        self.existing_price().map(PriceConfig::item_ids).unwrap_or_default()
    }
}

/// Top-ranked items, or the fixed list if the catalog cannot rank
pub async fn top_items(catalog: &dyn CatalogService) -> Vec<CatalogItem> {
    match catalog.list_top(TOP_LIMIT).await {
        Ok(items) if !items.is_empty() => items,
        Ok(_) => fallback_top(TOP_LIMIT),
        Err(e) => {
            warn!("Error fetching top cryptocurrencies, using fallback list: {}", e);
            fallback_top(TOP_LIMIT)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;

    #[tokio::test]
    async fn test_snapshot_fetched_once() {
        let catalog = StaticCatalog::new(vec![CatalogItem::new("bitcoin", "Bitcoin", "btc")]);
        let mut session = WizardSession::new();

        assert!(!session.has_snapshot());
        assert_eq!(session.snapshot(&catalog).await.len(), 1);
        assert_eq!(session.snapshot(&catalog).await.len(), 1);
        assert_eq!(catalog.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_snapshot_is_memoized_empty() {
        let catalog = StaticCatalog::unavailable();
        let mut session = WizardSession::new();

        assert!(session.snapshot(&catalog).await.is_empty());
        assert!(session.snapshot(&catalog).await.is_empty());
        assert_eq!(catalog.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_top_items_fallback() {
        let items = top_items(&StaticCatalog::unavailable()).await;
        assert_eq!(items, fallback_top(TOP_LIMIT));
    }
}
