//! Application state management

use crate::catalog::{CatalogService, CoinGeckoClient};
use crate::config::{shared_settings, ClientConfig, SharedSettings};
use crate::db::sqlite::SqliteDb;
use crate::error::Result;
use crate::flow::FlowContext;
use crate::host::{EntitySync, RecordListener};
use crate::scheduler::{RefreshScheduler, RequestThrottle};
use crate::services::FlowManager;
use crate::sources::SourceFactory;
use std::path::PathBuf;
use std::sync::Arc;

/// Application state shared by every caller
pub struct AppState {
    /// SQLite database connection
    pub sqlite: Arc<SqliteDb>,

    /// Item catalog used by configuration flows
    pub catalog: Arc<dyn CatalogService>,

    /// Integration-wide settings
    pub settings: SharedSettings,

    /// Background refresh of configured records
    pub scheduler: Arc<RefreshScheduler>,

    /// Configuration flows in progress
    pub flows: FlowManager,

    /// Application data directory
    pub data_dir: PathBuf,
}

impl AppState {
    /// Create new application state
    pub fn new(data_dir: PathBuf, config: &ClientConfig) -> Result<Self> {
        // Create data directory if it doesn't exist
        std::fs::create_dir_all(&data_dir)?;

        tracing::info!("Data directory: {:?}", data_dir);

        let sqlite_path = data_dir.join("cryptoinfo.db");
        let sqlite = Arc::new(SqliteDb::new(&sqlite_path)?);

        let settings = shared_settings(sqlite.get_settings()?);
        let catalog: Arc<dyn CatalogService> = Arc::new(CoinGeckoClient::new(config)?);

        let throttle = Arc::new(RequestThrottle::new(settings.clone()));
        let sources = Arc::new(SourceFactory::new(config, throttle)?);
        let scheduler = Arc::new(RefreshScheduler::new(sources));

        let listeners: Vec<Arc<dyn RecordListener>> = vec![
            Arc::new(EntitySync::new(sqlite.clone())),
            scheduler.clone(),
        ];

        let flows = FlowManager::new(FlowContext {
            catalog: catalog.clone(),
            store: sqlite.clone(),
            registry: sqlite.clone(),
            settings: settings.clone(),
            listeners,
        });

        Ok(Self {
            sqlite,
            catalog,
            settings,
            scheduler,
            flows,
            data_dir,
        })
    }

    /// Schedule refresh of every stored record. Must run inside a tokio runtime.
    pub fn start_refresh(&self) -> Result<usize> {
        let records = self.sqlite.list_records()?;
        let mut scheduled = 0;

        for entry in &records {
            match self.scheduler.schedule(entry) {
                Ok(()) => scheduled += 1,
                Err(e) => tracing::warn!("Not refreshing entry {}: {}", entry.entry_id, e),
            }
        }

        tracing::info!("Refreshing {} of {} records", scheduled, records.len());
        Ok(scheduled)
    }

    /// Delete a record, its entities and its refresh task
    pub fn remove_entry(&self, entry_id: &str) -> Result<()> {
        self.scheduler.unschedule(entry_id);
        self.sqlite.delete_record(entry_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::models::{MiningConfig, RecordData, SensorType};
    use crate::host::RecordStore;

    fn offline_config() -> ClientConfig {
        ClientConfig {
            coingecko_base_url: "http://127.0.0.1:9".to_string(),
            mempool_base_url: "http://127.0.0.1:9".to_string(),
            ckpool_base_url: "http://127.0.0.1:9".to_string(),
            request_timeout: std::time::Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_state_restores_records() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(dir.path().join("data"), &offline_config()).unwrap();
        assert_eq!(state.settings.read().min_time_between_requests, 0.25);

        let entry = state
            .sqlite
            .create_record(&RecordData::Mining(MiningConfig {
                sensor_type: SensorType::BtcNetwork,
                label: "BTC".to_string(),
                update_frequency: 5.0,
                btc_address: None,
            }))
            .unwrap();

        assert_eq!(state.start_refresh().unwrap(), 1);
        assert!(state.scheduler.is_scheduled(&entry.entry_id));

        state.remove_entry(&entry.entry_id).unwrap();
        assert!(!state.scheduler.is_scheduled(&entry.entry_id));
        assert!(state.sqlite.list_records().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flows_share_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(dir.path().to_path_buf(), &offline_config()).unwrap();

        let step = state.flows.start_user().await.unwrap();
        assert_eq!(state.flows.in_progress().len(), 1);
        assert!(state.flows.abort(step.flow_id));
        assert!(dir.path().join("cryptoinfo.db").exists());
    }
}
