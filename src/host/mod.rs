//! Host-side collaborators of the configuration flow
//!
//! The flow never talks to storage directly. It goes through these traits:
//!
//! - [`RecordStore`] - durable configuration records and integration settings
//! - [`EntityRegistry`] - dependent objects derived from records, removable by key
//! - [`RecordListener`] - notified after a record is created or updated
//!
//! `SqliteDb` implements the first two; [`EntitySync`] and the refresh
//! scheduler are the stock listeners.

mod entities;

use crate::config::IntegrationSettings;
use crate::db::sqlite::models::{ConfigEntry, EntityEntry, RecordData};
use crate::error::Result;

pub use entities::EntitySync;

/// Durable store of configuration records
pub trait RecordStore: Send + Sync {
    /// Persist a new record and return it with its generated entry id
    fn create_record(&self, data: &RecordData) -> Result<ConfigEntry>;

    /// Replace the data of an existing record in place
    fn update_record(&self, entry_id: &str, data: &RecordData) -> Result<ConfigEntry>;

    /// Re-read a record from storage
    fn reload(&self, entry_id: &str) -> Result<ConfigEntry>;

    /// Get a record if it exists
    fn get_record(&self, entry_id: &str) -> Result<Option<ConfigEntry>>;

    /// (entry_id, unique_key) of every stored record
    fn unique_keys(&self) -> Result<Vec<(String, String)>>;

    /// Persist integration-wide settings
    fn save_settings(&self, settings: &IntegrationSettings) -> Result<()>;
}

/// Registry of dependent objects, keyed by derived unique id
pub trait EntityRegistry: Send + Sync {
    /// Add an entity if its key is not registered yet. Returns true if added.
    fn register(&self, entity: &EntityEntry) -> Result<bool>;

    /// Remove the entity with this key. Returns false if there was none.
    fn remove_by_key(&self, unique_id: &str) -> Result<bool>;

    /// Entities registered for a record
    fn entities_for(&self, entry_id: &str) -> Result<Vec<EntityEntry>>;
}

/// Hook invoked whenever a flow finalizes a record
pub trait RecordListener: Send + Sync {
    fn on_record_finalized(&self, entry: &ConfigEntry) -> Result<()>;
}
