//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation. It also owns the
//! [`ChangeFeed`] on which every document write is announced.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use rusqlite::Connection;
use synergy_shared::constants::CHANGE_FEED_CAPACITY;

use crate::error::{Result, StoreError};
use crate::feed::ChangeFeed;
use crate::migrations;

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
    feed: ChangeFeed,
}

impl Database {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/synergysphere/synergy.db`
    /// - macOS:   `~/Library/Application Support/com.synergysphere.synergysphere/synergy.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\synergysphere\synergysphere\data\synergy.db`
    pub fn new() -> Result<Self> {
        let path = Self::default_path()?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        tracing::info!(path = %path.display(), "opening database");

        Self::open_at(&path)
    }

    /// Default location of the database file.
    pub fn default_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "synergysphere", "synergysphere")
            .ok_or(StoreError::NoDataDir)?;
        Ok(project_dirs.data_dir().join("synergy.db"))
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// Open a private, non-persistent database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn,
            feed: ChangeFeed::new(CHANGE_FEED_CAPACITY),
        })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// The feed on which document writes are announced.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn
            .path()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}
