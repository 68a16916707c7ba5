//! The SQLite file behind the local cache.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::migrations;

const DB_FILE_NAME: &str = "chatsync.db";

/// An open, fully migrated SQLite connection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the cache database in the platform data directory, e.g.
    /// `~/.local/share/chatsync/chatsync.db` on Linux.
    pub fn new() -> Result<Self> {
        let path = default_path()?;
        tracing::info!(path = %path.display(), "opening cache database");
        Self::open_at(&path)
    }

    /// Open (or create) the database at `path`, creating missing parent
    /// directories.
    pub fn open_at(path: &Path) -> Result<Self> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)?,
            _ => {}
        }

        let conn = Connection::open(path)?;
        // Readers keep seeing the previous payload while a save commits.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::migrated(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::migrated(Connection::open_in_memory()?)
    }

    fn migrated(conn: Connection) -> Result<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// File backing this database; `None` for in-memory databases.
    pub fn path(&self) -> Option<PathBuf> {
        self.conn
            .path()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}

fn default_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("org", "chatsync", "chatsync").ok_or(StoreError::NoDataDir)?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;
    Ok(data_dir.join(DB_FILE_NAME))
}
