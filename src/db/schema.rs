//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS reminders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message TEXT NOT NULL,
            remind_at TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::debug!("migrated database to v1");
    Ok(())
}

/// The poller looks reminders up by due minute every cycle
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        CREATE INDEX IF NOT EXISTS idx_reminders_remind_at ON reminders(remind_at);

        PRAGMA user_version = 2;
        ",
    )?;

    tracing::debug!("migrated database to v2");
    Ok(())
}
