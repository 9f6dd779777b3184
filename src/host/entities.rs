//! Builds dependent objects from finalized records

use crate::db::sqlite::models::{ConfigEntry, EntityEntry, RecordData};
use crate::error::Result;
use crate::host::{EntityRegistry, RecordListener};
use std::sync::Arc;
use tracing::debug;

/// Registers the entities a record calls for, leaving existing ones untouched
pub struct EntitySync {
    registry: Arc<dyn EntityRegistry>,
}

impl EntitySync {
    pub fn new(registry: Arc<dyn EntityRegistry>) -> Self {
        Self { registry }
    }

    fn entities(entry: &ConfigEntry) -> Vec<EntityEntry> {
        match &entry.data {
            RecordData::Price(config) => config
                .item_ids()
                .into_iter()
                .map(|item_id| EntityEntry {
                    unique_id: config.entity_key(&item_id),
                    entry_id: entry.entry_id.clone(),
                    name: format!("{} {}", config.label, item_id).trim().to_string(),
                })
                .collect(),
            RecordData::Mining(config) => vec![EntityEntry {
                unique_id: config.entity_key(),
                entry_id: entry.entry_id.clone(),
                name: entry.title.clone(),
            }],
        }
    }
}

impl RecordListener for EntitySync {
    fn on_record_finalized(&self, entry: &ConfigEntry) -> Result<()> {
        let mut added = 0;
        for entity in Self::entities(entry) {
            if self.registry.register(&entity)? {
                added += 1;
            }
        }

        debug!("EntitySync: {} new entities for entry {}", added, entry.entry_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::models::PriceConfig;
    use crate::db::sqlite::SqliteDb;
    use crate::host::RecordStore;

    #[test]
    fn test_sync_registers_missing_entities_only() {
        let db = Arc::new(SqliteDb::open_in_memory().unwrap());
        let data = RecordData::Price(PriceConfig {
            label: "Wallet".to_string(),
            cryptocurrency_ids: "bitcoin, ethereum".to_string(),
            multipliers: "1, 1".to_string(),
            currency_name: "usd".to_string(),
            unit_of_measurement: String::new(),
            update_frequency: 5.0,
            min_time_between_requests: 0.25,
        });
        let entry = db.create_record(&data).unwrap();

        let sync = EntitySync::new(db.clone());
        sync.on_record_finalized(&entry).unwrap();
        sync.on_record_finalized(&entry).unwrap();

        let entities = db.entities_for(&entry.entry_id).unwrap();
        let keys: Vec<&str> = entities.iter().map(|e| e.unique_id.as_str()).collect();
        assert_eq!(
            keys,
            vec!["cryptoinfo_wallet_bitcoin_usd", "cryptoinfo_wallet_ethereum_usd"]
        );
    }
}
