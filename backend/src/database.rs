use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Location of the SQLite database. Every request opens its own connection.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a connection with foreign keys enforced, which the cascading
    /// deletes of forms and records rely on.
    pub fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }
}
