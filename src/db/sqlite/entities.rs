//! Dependent-object (entity) registry

use crate::db::sqlite::models::EntityEntry;
use crate::error::Result;
use rusqlite::{params, Connection};

/// Register an entity unless one with the same unique id already exists.
/// Returns true when a new row was inserted.
pub fn register_entity(conn: &Connection, entity: &EntityEntry) -> Result<bool> {
    let rows = conn.execute(
        "INSERT OR IGNORE INTO entities (unique_id, entry_id, name) VALUES (?1, ?2, ?3)",
        params![entity.unique_id, entity.entry_id, entity.name],
    )?;

    Ok(rows > 0)
}

/// Remove the entity with the given unique id. Returns false if none existed.
pub fn remove_entity(conn: &Connection, unique_id: &str) -> Result<bool> {
    let rows = conn.execute("DELETE FROM entities WHERE unique_id = ?1", [unique_id])?;
    Ok(rows > 0)
}

/// Entities belonging to a record
pub fn entities_for_entry(conn: &Connection, entry_id: &str) -> Result<Vec<EntityEntry>> {
    let mut stmt = conn.prepare(
        "SELECT unique_id, entry_id, name FROM entities WHERE entry_id = ?1 ORDER BY rowid",
    )?;

    let entities = stmt
        .query_map([entry_id], |row| {
            Ok(EntityEntry {
                unique_id: row.get(0)?,
                entry_id: row.get(1)?,
                name: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(entities)
}

/// Remove every entity of a record
pub fn remove_entities_for_entry(conn: &Connection, entry_id: &str) -> Result<usize> {
    let rows = conn.execute("DELETE FROM entities WHERE entry_id = ?1", [entry_id])?;
    Ok(rows)
}
