//! Reminder repository
//!
//! Reminders are stored with local wall-clock times truncated to the minute.

use chrono::{NaiveDateTime, Timelike};
use rusqlite::params;

use super::DbPool;
use crate::{Error, Result};

/// Storage format for `remind_at`; sorts lexicographically in time order
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A stored reminder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub id: i64,
    pub message: String,
    pub remind_at: NaiveDateTime,
}

/// How `due` selects reminders for a given minute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DueMatch {
    /// Only reminders due at exactly this minute
    #[default]
    Exact,
    /// Reminders due at or before this minute
    UpTo,
}

/// Persistent reminder storage
pub trait ReminderStore: Send + Sync {
    /// Insert a reminder, returning its id
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    fn insert(&self, message: &str, remind_at: NaiveDateTime) -> Result<i64>;

    /// Reminders due at `minute` (already truncated to the minute)
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    fn due(&self, minute: NaiveDateTime, matching: DueMatch) -> Result<Vec<Reminder>>;

    /// Delete a reminder by id
    ///
    /// # Errors
    ///
    /// Returns error if the delete fails
    fn delete(&self, id: i64) -> Result<()>;

    /// All pending reminders, soonest first
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    fn list(&self) -> Result<Vec<Reminder>>;
}

/// Drop seconds and sub-second precision
#[must_use]
pub fn truncate_to_minute(at: NaiveDateTime) -> NaiveDateTime {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

/// `SQLite`-backed reminder store
#[derive(Clone)]
pub struct SqliteReminderStore {
    pool: DbPool,
}

impl SqliteReminderStore {
    /// Create a new reminder store
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<super::DbConn> {
        self.pool.get().map_err(|e| Error::Database(e.to_string()))
    }
}

impl ReminderStore for SqliteReminderStore {
    fn insert(&self, message: &str, remind_at: NaiveDateTime) -> Result<i64> {
        let conn = self.conn()?;
        let remind_at = truncate_to_minute(remind_at);

        conn.execute(
            "INSERT INTO reminders (message, remind_at) VALUES (?1, ?2)",
            params![message, remind_at.format(TIMESTAMP_FORMAT).to_string()],
        )?;

        let id = conn.last_insert_rowid();
        tracing::debug!(id, message, %remind_at, "reminder stored");
        Ok(id)
    }

    fn due(&self, minute: NaiveDateTime, matching: DueMatch) -> Result<Vec<Reminder>> {
        let conn = self.conn()?;
        let sql = match matching {
            DueMatch::Exact => {
                "SELECT id, message, remind_at FROM reminders WHERE remind_at = ?1 ORDER BY id"
            }
            DueMatch::UpTo => {
                "SELECT id, message, remind_at FROM reminders WHERE remind_at <= ?1 ORDER BY remind_at, id"
            }
        };

        let mut stmt = conn.prepare(sql)?;
        let key = truncate_to_minute(minute).format(TIMESTAMP_FORMAT).to_string();
        let rows = stmt.query_map([key], row_to_reminder)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    fn delete(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM reminders WHERE id = ?1", [id])?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<Reminder>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, message, remind_at FROM reminders ORDER BY remind_at, id")?;
        let rows = stmt.query_map([], row_to_reminder)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }
}

fn row_to_reminder(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reminder> {
    let raw: String = row.get(2)?;
    let remind_at = NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Reminder {
        id: row.get(0)?,
        message: row.get(1)?,
        remind_at,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::db;

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    fn store() -> SqliteReminderStore {
        SqliteReminderStore::new(db::init_memory().unwrap())
    }

    #[test]
    fn test_insert_truncates_to_minute() {
        let store = store();
        store.insert("stretch", at(9, 15, 42)).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].remind_at, at(9, 15, 0));
    }

    #[test]
    fn test_due_exact_minute_only() {
        let store = store();
        store.insert("early", at(9, 14, 0)).unwrap();
        store.insert("on time", at(9, 15, 0)).unwrap();
        store.insert("late", at(9, 16, 0)).unwrap();

        let due = store.due(at(9, 15, 30), DueMatch::Exact).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].message, "on time");
    }

    #[test]
    fn test_due_up_to_includes_missed() {
        let store = store();
        store.insert("early", at(9, 14, 0)).unwrap();
        store.insert("on time", at(9, 15, 0)).unwrap();
        store.insert("late", at(9, 16, 0)).unwrap();

        let due = store.due(at(9, 15, 0), DueMatch::UpTo).unwrap();
        let messages: Vec<_> = due.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["early", "on time"]);
    }

    #[test]
    fn test_delete_removes_record() {
        let store = store();
        let id = store.insert("water plants", at(18, 0, 0)).unwrap();

        store.delete(id).unwrap();
        assert!(store.due(at(18, 0, 0), DueMatch::Exact).unwrap().is_empty());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let store = store();
        let a = store.insert("a", at(8, 0, 0)).unwrap();
        let b = store.insert("b", at(8, 0, 0)).unwrap();
        assert_ne!(a, b);
    }
}
