//! Configuration record management

use crate::db::sqlite::models::{ConfigEntry, RecordData};
use crate::error::{AppError, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

const SELECT_ENTRY: &str =
    "SELECT entry_id, unique_key, title, data, created_at, updated_at FROM config_entries";

/// Row as stored, before the JSON data column is decoded
struct RawEntry {
    entry_id: String,
    unique_key: String,
    title: String,
    data: String,
    created_at: String,
    updated_at: String,
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok(RawEntry {
        entry_id: row.get(0)?,
        unique_key: row.get(1)?,
        title: row.get(2)?,
        data: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn decode(raw: RawEntry) -> Result<ConfigEntry> {
    Ok(ConfigEntry {
        data: serde_json::from_str(&raw.data)?,
        entry_id: raw.entry_id,
        unique_key: raw.unique_key,
        title: raw.title,
        created_at: raw.created_at,
        updated_at: raw.updated_at,
    })
}

/// Insert a new record
pub fn create_entry(conn: &Connection, entry_id: &str, data: &RecordData) -> Result<ConfigEntry> {
    let json = serde_json::to_string(data)?;

    conn.execute(
        "INSERT INTO config_entries (entry_id, unique_key, title, sensor_type, data)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry_id,
            data.unique_key(),
            data.title(),
            data.sensor_type().as_str(),
            json,
        ],
    )?;

    get_entry_required(conn, entry_id)
}

/// Replace the data of an existing record
pub fn update_entry(conn: &Connection, entry_id: &str, data: &RecordData) -> Result<ConfigEntry> {
    let json = serde_json::to_string(data)?;

    let rows = conn.execute(
        "UPDATE config_entries
         SET unique_key = ?1, title = ?2, sensor_type = ?3, data = ?4, updated_at = datetime('now')
         WHERE entry_id = ?5",
        params![
            data.unique_key(),
            data.title(),
            data.sensor_type().as_str(),
            json,
            entry_id,
        ],
    )?;

    if rows == 0 {
        return Err(AppError::NotFound(format!("Config entry not found: {}", entry_id)));
    }

    get_entry_required(conn, entry_id)
}

/// Get a record by entry id
pub fn get_entry(conn: &Connection, entry_id: &str) -> Result<Option<ConfigEntry>> {
    let raw = conn
        .query_row(
            &format!("{} WHERE entry_id = ?1", SELECT_ENTRY),
            [entry_id],
            entry_from_row,
        )
        .optional()?;

    raw.map(decode).transpose()
}

fn get_entry_required(conn: &Connection, entry_id: &str) -> Result<ConfigEntry> {
    get_entry(conn, entry_id)?
        .ok_or_else(|| AppError::NotFound(format!("Config entry not found: {}", entry_id)))
}

/// List all records, oldest first
pub fn list_entries(conn: &Connection) -> Result<Vec<ConfigEntry>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY created_at, rowid", SELECT_ENTRY))?;

    let raw = stmt
        .query_map([], entry_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter().map(decode).collect()
}

/// (entry_id, unique_key) of every record
pub fn unique_keys(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare("SELECT entry_id, unique_key FROM config_entries")?;

    let keys = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(keys)
}

/// Delete a record
pub fn delete_entry(conn: &Connection, entry_id: &str) -> Result<()> {
    let rows = conn.execute("DELETE FROM config_entries WHERE entry_id = ?1", [entry_id])?;

    if rows == 0 {
        return Err(AppError::NotFound(format!("Config entry not found: {}", entry_id)));
    }

    Ok(())
}
