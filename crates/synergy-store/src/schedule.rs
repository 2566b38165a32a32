//! Persistence for locally scheduled notifications.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::ScheduledNotification;

impl Database {
    pub fn insert_scheduled(&self, notification: &ScheduledNotification) -> Result<()> {
        self.conn().execute(
            "INSERT INTO scheduled_notifications (id, title, body, fire_at, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                notification.id,
                notification.title,
                notification.body,
                notification.fire_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
                serde_json::to_string(&notification.payload)?,
                notification.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Delete a scheduled notification. Returns `true` if it existed.
    pub fn delete_scheduled(&self, id: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM scheduled_notifications WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    /// All pending notifications, soonest first.
    pub fn list_scheduled(&self) -> Result<Vec<ScheduledNotification>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, title, body, fire_at, payload, created_at
             FROM scheduled_notifications
             ORDER BY fire_at ASC, id ASC",
        )?;
        let rows = stmt.query_map([], row_to_scheduled)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

fn row_to_scheduled(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduledNotification> {
    let fire_str: String = row.get(3)?;
    let payload_str: String = row.get(4)?;
    let created_str: String = row.get(5)?;

    let parse = |idx: usize, s: &str| {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
            })
    };

    let payload = serde_json::from_str(&payload_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(ScheduledNotification {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        fire_at: parse(3, &fire_str)?,
        payload,
        created_at: parse(5, &created_str)?,
    })
}
