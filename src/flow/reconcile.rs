//! Reconciliation after a reconfigure
//!
//! Removes the dependent objects of items that were dropped from a record's
//! selection. Objects a kept item holds under a key the record no longer uses
//! (after a label or currency change) are removed too, so the item is left
//! with exactly the object registered for its current key.

use crate::db::sqlite::models::PriceConfig;
use crate::host::EntityRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// A removal that failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalFailure {
    pub key: String,
    pub error: String,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Keys whose objects were removed
    pub removed: Vec<String>,
    /// Old keys of kept items, removed so the item is registered under its new key
    #[serde(default)]
    pub superseded: Vec<String>,
    /// Keys with no registered object
    pub not_found: Vec<String>,
    pub failed: Vec<RemovalFailure>,
}

impl ReconcileReport {
    pub fn is_partial_failure(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.removed.len() + self.superseded.len() + self.not_found.len() + self.failed.len()
    }

    fn remove(&mut self, registry: &dyn EntityRegistry, key: String, superseded: bool) {
        match registry.remove_by_key(&key) {
            Ok(true) if superseded => self.superseded.push(key),
            Ok(true) => self.removed.push(key),
            Ok(false) => self.not_found.push(key),
            Err(e) => {
                warn!("Failed to remove entity {}: {}", key, e);
                self.failed.push(RemovalFailure {
                    key,
                    error: e.to_string(),
                });
            }
        }
    }
}

/// `old - new`, in `old` order
pub fn removed_items(old_ids: &[String], new_ids: &[String]) -> Vec<String> {
    let keep: HashSet<&str> = new_ids.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    old_ids
        .iter()
        .filter(|id| !keep.contains(id.as_str()) && seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Bring the objects registered for `entry_id` in line with `updated`.
///
/// Dropped items are removed under the key `previous` registered them with.
/// Any other object of the record whose key `updated` does not produce is
/// removed as well; this catches keys left by earlier label or currency
/// changes. Every removal is attempted on its own; a failure is recorded and
/// the rest still run.
pub fn reconcile(
    registry: &dyn EntityRegistry,
    entry_id: &str,
    previous: &PriceConfig,
    updated: &PriceConfig,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let new_ids = updated.item_ids();
    let wanted: HashSet<String> = new_ids.iter().map(|id| updated.entity_key(id)).collect();
    let mut handled: HashSet<String> = HashSet::new();

    let dropped = removed_items(&previous.item_ids(), &new_ids);
    if !dropped.is_empty() {
        debug!("Removing entities for dropped items: {:?}", dropped);
    }
    for item_id in dropped {
        let key = previous.entity_key(&item_id);
        if wanted.contains(&key) || !handled.insert(key.clone()) {
            continue;
        }
        report.remove(registry, key, false);
    }

    let registered = match registry.entities_for(entry_id) {
        Ok(registered) => registered,
        Err(e) => {
            warn!("Failed to list entities of entry {}: {}", entry_id, e);
            report.failed.push(RemovalFailure {
                key: entry_id.to_string(),
                error: e.to_string(),
            });
            return report;
        }
    };

    let kept_keys: HashSet<String> = new_ids.iter().map(|id| previous.entity_key(id)).collect();
    for entity in registered {
        let key = entity.unique_id;
        if wanted.contains(&key) || !handled.insert(key.clone()) {
            continue;
        }
        let superseded = kept_keys.contains(&key);
        debug!("Removing stale entity {} of entry {}", key, entry_id);
        report.remove(registry, key, superseded);
    }

    report
}
