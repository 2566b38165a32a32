//! v002 -- Identity accounts, password resets and scheduled notifications.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    uid           TEXT PRIMARY KEY NOT NULL,
    email         TEXT NOT NULL UNIQUE COLLATE NOCASE,
    display_name  TEXT,
    password_salt TEXT NOT NULL,              -- hex, 16 random bytes
    password_hash TEXT NOT NULL,              -- hex BLAKE3(salt || password)
    created_at    TEXT NOT NULL               -- RFC-3339
);

CREATE TABLE IF NOT EXISTS password_resets (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    email        TEXT NOT NULL,
    requested_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS scheduled_notifications (
    id         TEXT PRIMARY KEY NOT NULL,
    title      TEXT NOT NULL,
    body       TEXT NOT NULL,
    fire_at    TEXT NOT NULL,                 -- RFC-3339
    payload    TEXT NOT NULL,                 -- JSON
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_scheduled_fire_at ON scheduled_notifications(fire_at);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
