//! Periodic refresh of configured records
//!
//! One background task per record polls its metric source every
//! `update_frequency` minutes and keeps the latest snapshot in memory.

use crate::config::minutes_to_duration;
use crate::db::sqlite::models::ConfigEntry;
use crate::error::{AppError, Result};
use crate::host::RecordListener;
use crate::sources::{Snapshot, SourceProvider};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Refresh scheduler, started and restarted by finalized records
pub struct RefreshScheduler {
    provider: Arc<dyn SourceProvider>,
    tasks: DashMap<String, JoinHandle<()>>,
    latest: Arc<DashMap<String, Snapshot>>,
}

impl RefreshScheduler {
    pub fn new(provider: Arc<dyn SourceProvider>) -> Self {
        Self {
            provider,
            tasks: DashMap::new(),
            latest: Arc::new(DashMap::new()),
        }
    }

    /// Start polling a record, replacing any task already running for it
    pub fn schedule(&self, entry: &ConfigEntry) -> Result<()> {
        let minutes = entry.data.update_frequency();
        let period = minutes_to_duration(minutes).map_err(|e| {
            AppError::Validation(format!("Invalid update frequency for entry {}: {}", entry.entry_id, e))
        })?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AppError::Internal(format!("No async runtime for refresh task: {}", e)))?;

        let source = self.provider.source_for(entry)?;
        let entry_id = entry.entry_id.clone();
        let latest = self.latest.clone();

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match source.fetch().await {
                    Ok(snapshot) => {
                        debug!("Refreshed {} for entry {}: {} values", source.name(), entry_id, snapshot.len());
                        latest.insert(entry_id.clone(), snapshot);
                    }
                    Err(e) => warn!("Error refreshing {} for entry {}: {}", source.name(), entry_id, e),
                }
            }
        });

        if let Some(previous) = self.tasks.insert(entry.entry_id.clone(), task) {
            previous.abort();
            debug!("Replaced refresh task for entry {}", entry.entry_id);
        }

        info!(
            "Scheduled refresh of entry {} every {} minutes",
            entry.entry_id, minutes
        );
        Ok(())
    }

    /// Stop polling a record and drop its snapshot. Returns false if it was not scheduled.
    pub fn unschedule(&self, entry_id: &str) -> bool {
        self.latest.remove(entry_id);
        match self.tasks.remove(entry_id) {
            Some((_, task)) => {
                task.abort();
                info!("Stopped refresh of entry {}", entry_id);
                true
            }
            None => false,
        }
    }

    /// Most recent snapshot of a record
    pub fn latest(&self, entry_id: &str) -> Option<Snapshot> {
        self.latest.get(entry_id).map(|snapshot| snapshot.value().clone())
    }

    pub fn is_scheduled(&self, entry_id: &str) -> bool {
        self.tasks.contains_key(entry_id)
    }

    pub fn scheduled_count(&self) -> usize {
        self.tasks.len()
    }

    /// Stop every task
    pub fn shutdown(&self) {
        for task in self.tasks.iter() {
            task.value().abort();
        }
        self.tasks.clear();
    }
}

impl RecordListener for RefreshScheduler {
    fn on_record_finalized(&self, entry: &ConfigEntry) -> Result<()> {
        self.schedule(entry)
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::models::{MiningConfig, RecordData, SensorType};
    use crate::sources::MetricSource;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingSource {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MetricSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        async fn fetch(&self) -> Result<Snapshot> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let mut snapshot = Snapshot::new();
            snapshot.insert("calls".to_string(), json!(n));
            Ok(snapshot)
        }
    }

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
    }

    impl SourceProvider for CountingProvider {
        fn source_for(&self, _entry: &ConfigEntry) -> Result<Arc<dyn MetricSource>> {
            Ok(Arc::new(CountingSource {
                calls: self.calls.clone(),
            }))
        }
    }

    fn entry(update_frequency: f64) -> ConfigEntry {
        let data = RecordData::Mining(MiningConfig {
            sensor_type: SensorType::BtcMempool,
            label: "Mempool".to_string(),
            update_frequency,
            btc_address: None,
        });
        ConfigEntry {
            entry_id: "entry-1".to_string(),
            unique_key: data.unique_key(),
            title: data.title(),
            data,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn scheduler() -> (RefreshScheduler, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Arc::new(CountingProvider {
            calls: calls.clone(),
        });
        (RefreshScheduler::new(provider), calls)
    }

    #[tokio::test]
    async fn test_first_refresh_runs_immediately() {
        let (scheduler, calls) = scheduler();
        scheduler.on_record_finalized(&entry(5.0)).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.latest("entry-1").unwrap()["calls"], json!(1));
    }

    #[tokio::test]
    async fn test_reschedule_replaces_task() {
        let (scheduler, _calls) = scheduler();
        scheduler.schedule(&entry(5.0)).unwrap();
        scheduler.schedule(&entry(10.0)).unwrap();
        assert_eq!(scheduler.scheduled_count(), 1);

        assert!(scheduler.unschedule("entry-1"));
        assert!(!scheduler.is_scheduled("entry-1"));
        assert!(scheduler.latest("entry-1").is_none());
        assert!(!scheduler.unschedule("entry-1"));
    }

    #[tokio::test]
    async fn test_invalid_frequency_rejected() {
        let (scheduler, _calls) = scheduler();
        assert!(scheduler.schedule(&entry(0.0)).is_err());
        assert_eq!(scheduler.scheduled_count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_frequency_rejected() {
        let (scheduler, calls) = scheduler();
        let result = scheduler.on_record_finalized(&entry(1e300));
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(!scheduler.is_scheduled("entry-1"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_schedule_outside_runtime_fails() {
        let (scheduler, _calls) = scheduler();
        assert!(matches!(scheduler.schedule(&entry(5.0)), Err(AppError::Internal(_))));
    }
}
