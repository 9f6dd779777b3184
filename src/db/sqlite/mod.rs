//! SQLite database module

pub mod models;
mod migrations;
mod records;
mod entities;
mod settings;

use crate::config::IntegrationSettings;
use crate::error::Result;
use crate::host::{EntityRegistry, RecordStore};
use models::*;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Create new SQLite database connection
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent readers
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::with_connection(conn)
    }

    /// Create an in-memory database (nothing survives the process)
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Config Entry Methods ==========

    /// List all records
    pub fn list_records(&self) -> Result<Vec<ConfigEntry>> {
        let conn = self.conn.lock();
        records::list_entries(&conn)
    }

    /// Delete a record together with its entities
    pub fn delete_record(&self, entry_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        records::delete_entry(&conn, entry_id)?;
        let removed = entities::remove_entities_for_entry(&conn, entry_id)?;
        tracing::info!("Deleted config entry {} and {} entities", entry_id, removed);
        Ok(())
    }

    // ========== Settings Methods ==========

    /// Get integration settings
    pub fn get_settings(&self) -> Result<IntegrationSettings> {
        let conn = self.conn.lock();
        settings::get_settings(&conn)
    }
}

impl RecordStore for SqliteDb {
    fn create_record(&self, data: &RecordData) -> Result<ConfigEntry> {
        let entry_id = uuid::Uuid::new_v4().simple().to_string();
        let conn = self.conn.lock();
        let entry = records::create_entry(&conn, &entry_id, data)?;
        tracing::info!("Created config entry {} ({})", entry.entry_id, entry.title);
        Ok(entry)
    }

    fn update_record(&self, entry_id: &str, data: &RecordData) -> Result<ConfigEntry> {
        let conn = self.conn.lock();
        let entry = records::update_entry(&conn, entry_id, data)?;
        tracing::info!("Updated config entry {} ({})", entry.entry_id, entry.title);
        Ok(entry)
    }

    fn reload(&self, entry_id: &str) -> Result<ConfigEntry> {
        let conn = self.conn.lock();
        records::get_entry(&conn, entry_id)?.ok_or_else(|| {
            crate::error::AppError::NotFound(format!("Config entry not found: {}", entry_id))
        })
    }

    fn get_record(&self, entry_id: &str) -> Result<Option<ConfigEntry>> {
        let conn = self.conn.lock();
        records::get_entry(&conn, entry_id)
    }

    fn unique_keys(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock();
        records::unique_keys(&conn)
    }

    fn save_settings(&self, value: &IntegrationSettings) -> Result<()> {
        let conn = self.conn.lock();
        settings::save_settings(&conn, value)
    }
}

impl EntityRegistry for SqliteDb {
    fn register(&self, entity: &EntityEntry) -> Result<bool> {
        let conn = self.conn.lock();
        entities::register_entity(&conn, entity)
    }

    fn remove_by_key(&self, unique_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let removed = entities::remove_entity(&conn, unique_id)?;
        if removed {
            tracing::debug!("Removed entity {}", unique_id);
        }
        Ok(removed)
    }

    fn entities_for(&self, entry_id: &str) -> Result<Vec<EntityEntry>> {
        let conn = self.conn.lock();
        entities::entities_for_entry(&conn, entry_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use tempfile::tempdir;

    fn network(label: &str) -> RecordData {
        RecordData::Mining(MiningConfig {
            sensor_type: SensorType::BtcNetwork,
            label: label.to_string(),
            update_frequency: 5.0,
            btc_address: None,
        })
    }

    #[test]
    fn test_create_and_reload_record() {
        let db = SqliteDb::open_in_memory().unwrap();

        let entry = db.create_record(&network("Home")).unwrap();
        assert_eq!(entry.unique_key, "btc_network_home");
        assert_eq!(entry.title, "Bitcoin Network - Home");

        let reloaded = db.reload(&entry.entry_id).unwrap();
        assert_eq!(reloaded.data, network("Home"));
        assert_eq!(db.unique_keys().unwrap(), vec![(entry.entry_id, "btc_network_home".to_string())]);
    }

    #[test]
    fn test_duplicate_unique_key_rejected() {
        let db = SqliteDb::open_in_memory().unwrap();
        db.create_record(&network("Home")).unwrap();

        let result = db.create_record(&network("home"));
        assert!(matches!(&result, Err(e) if e.is_constraint_violation()));
        assert_eq!(db.list_records().unwrap().len(), 1);
    }

    #[test]
    fn test_update_missing_record() {
        let db = SqliteDb::open_in_memory().unwrap();
        let result = db.update_record("nope", &network("x"));
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_entity_registry() {
        let db = SqliteDb::open_in_memory().unwrap();
        let entity = EntityEntry {
            unique_id: "cryptoinfo_btc_network_home".to_string(),
            entry_id: "e1".to_string(),
            name: "Bitcoin Network".to_string(),
        };

        assert!(db.register(&entity).unwrap());
        assert!(!db.register(&entity).unwrap());
        assert_eq!(db.entities_for("e1").unwrap().len(), 1);

        assert!(db.remove_by_key("cryptoinfo_btc_network_home").unwrap());
        assert!(!db.remove_by_key("cryptoinfo_btc_network_home").unwrap());
    }

    #[test]
    fn test_settings_persist_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cryptoinfo.db");

        {
            let db = SqliteDb::new(&path).unwrap();
            assert_eq!(db.get_settings().unwrap(), IntegrationSettings::default());
            db.save_settings(&IntegrationSettings {
                min_time_between_requests: 1.5,
            })
            .unwrap();
        }

        let db = SqliteDb::new(&path).unwrap();
        assert_eq!(db.get_settings().unwrap().min_time_between_requests, 1.5);
    }

    #[test]
    fn test_delete_record_removes_entities() {
        let db = SqliteDb::open_in_memory().unwrap();
        let entry = db.create_record(&network("Home")).unwrap();
        db.register(&EntityEntry {
            unique_id: "cryptoinfo_btc_network_home".to_string(),
            entry_id: entry.entry_id.clone(),
            name: "Bitcoin Network".to_string(),
        })
        .unwrap();

        db.delete_record(&entry.entry_id).unwrap();
        assert!(db.get_record(&entry.entry_id).unwrap().is_none());
        assert!(db.entities_for(&entry.entry_id).unwrap().is_empty());
    }
}
