//! SQLite database models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix shared by every dependent-object key
pub const SENSOR_PREFIX: &str = "Cryptoinfo ";

/// Kind of sensor a record configures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    /// Prices of a user-chosen set of catalog items
    Price,
    /// Bitcoin network-wide statistics
    BtcNetwork,
    /// Bitcoin mempool statistics
    BtcMempool,
    /// CKPool solo mining account statistics
    CkpoolMining,
}

impl SensorType {
    pub const ALL: [SensorType; 4] = [
        SensorType::Price,
        SensorType::BtcNetwork,
        SensorType::BtcMempool,
        SensorType::CkpoolMining,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Price => "price",
            SensorType::BtcNetwork => "btc_network",
            SensorType::BtcMempool => "btc_mempool",
            SensorType::CkpoolMining => "ckpool_mining",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SensorType::Price => "Cryptocurrency Price Tracker",
            SensorType::BtcNetwork => "Bitcoin Network",
            SensorType::BtcMempool => "Bitcoin Mempool",
            SensorType::CkpoolMining => "CKPool Mining",
        }
    }

    /// Whether this category tracks a selection of catalog items
    pub fn is_catalog(&self) -> bool {
        matches!(self, SensorType::Price)
    }

    /// Whether a source address must be supplied
    pub fn requires_address(&self) -> bool {
        matches!(self, SensorType::CkpoolMining)
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower-case and replace spaces with underscores
pub fn normalize_key(raw: &str) -> String {
    raw.to_lowercase().replace(' ', "_")
}

/// Key used to reject a second record for the same category and label
pub fn record_key(sensor_type: SensorType, label: &str) -> String {
    normalize_key(&format!("{}_{}", sensor_type.as_str(), label))
}

/// Key of the dependent object tracking one catalog item of a record
pub fn item_entity_key(label: &str, item_id: &str, currency: &str) -> String {
    normalize_key(&format!("{}{}_{}_{}", SENSOR_PREFIX, label, item_id, currency))
}

/// Split a comma-joined persisted list, dropping blank entries
pub fn split_list(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

pub fn join_list(items: &[String]) -> String {
    items.join(", ")
}

/// Catalog-tracking record data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceConfig {
    #[serde(rename = "id", default)]
    pub label: String,
    pub cryptocurrency_ids: String,
    pub multipliers: String,
    pub currency_name: String,
    #[serde(default)]
    pub unit_of_measurement: String,
    pub update_frequency: f64,
    pub min_time_between_requests: f64,
}

impl PriceConfig {
    pub fn item_ids(&self) -> Vec<String> {
        split_list(&self.cryptocurrency_ids)
    }

    pub fn multiplier_list(&self) -> Vec<String> {
        split_list(&self.multipliers)
    }

    /// Item ids paired positionally with their multipliers
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.item_ids()
            .into_iter()
            .zip(self.multiplier_list())
            .collect()
    }

    pub fn entity_key(&self, item_id: &str) -> String {
        item_entity_key(&self.label, item_id, &self.currency_name)
    }
}

/// Single-source record data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningConfig {
    pub sensor_type: SensorType,
    #[serde(rename = "id", default)]
    pub label: String,
    pub update_frequency: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub btc_address: Option<String>,
}

impl MiningConfig {
    /// Key of the single dependent object this record produces
    pub fn entity_key(&self) -> String {
        match self.sensor_type {
            SensorType::CkpoolMining => {
                let address = self.btc_address.as_deref().unwrap_or_default();
                let short: String = address.chars().take(8).collect();
                normalize_key(&format!("{}ckpool_{}", SENSOR_PREFIX, short))
            }
            other => normalize_key(&format!("{}{}_{}", SENSOR_PREFIX, other.as_str(), self.label)),
        }
    }
}

/// Persisted data of a configuration record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordData {
    Price(PriceConfig),
    Mining(MiningConfig),
}

impl RecordData {
    pub fn sensor_type(&self) -> SensorType {
        match self {
            RecordData::Price(_) => SensorType::Price,
            RecordData::Mining(config) => config.sensor_type,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            RecordData::Price(config) => &config.label,
            RecordData::Mining(config) => &config.label,
        }
    }

    pub fn update_frequency(&self) -> f64 {
        match self {
            RecordData::Price(config) => config.update_frequency,
            RecordData::Mining(config) => config.update_frequency,
        }
    }

    /// Derived key used for duplicate-record rejection
    pub fn unique_key(&self) -> String {
        record_key(self.sensor_type(), self.label())
    }

    pub fn title(&self) -> String {
        match self {
            RecordData::Price(config) => {
                let label = if config.label.is_empty() { "Wallet" } else { &config.label };
                format!("Cryptoinfo - {}", label)
            }
            RecordData::Mining(config) => {
                let label = if config.label.is_empty() { "Stats" } else { &config.label };
                format!("{} - {}", config.sensor_type.display_name(), label)
            }
        }
    }

    /// Keys of every dependent object this record should have
    pub fn entity_keys(&self) -> Vec<String> {
        match self {
            RecordData::Price(config) => config
                .item_ids()
                .iter()
                .map(|id| config.entity_key(id))
                .collect(),
            RecordData::Mining(config) => vec![config.entity_key()],
        }
    }
}

/// Configuration record model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub entry_id: String,
    pub unique_key: String,
    pub title: String,
    pub data: RecordData,
    pub created_at: String,
    pub updated_at: String,
}

/// Dependent object (entity) model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEntry {
    pub unique_id: String,
    pub entry_id: String,
    pub name: String,
}
