//! Integration settings persistence

use crate::config::IntegrationSettings;
use crate::error::Result;
use rusqlite::Connection;

/// Get settings
pub fn get_settings(conn: &Connection) -> Result<IntegrationSettings> {
    let settings = conn.query_row(
        "SELECT min_time_between_requests FROM settings WHERE id = 1",
        [],
        |row| {
            Ok(IntegrationSettings {
                min_time_between_requests: row.get(0)?,
            })
        },
    )?;

    Ok(settings)
}

/// Replace settings
pub fn save_settings(conn: &Connection, settings: &IntegrationSettings) -> Result<()> {
    conn.execute(
        "UPDATE settings SET min_time_between_requests = ?1, updated_at = datetime('now')
         WHERE id = 1",
        [settings.min_time_between_requests],
    )?;

    Ok(())
}
