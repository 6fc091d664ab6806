//! Database connection management
//!
//! A single SQLite connection is shared by every component through a cloned
//! `Database` handle. The connection is opened lazily on first use and can be
//! closed and re-opened; all statements are serialized through one mutex.

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{info, warn};

use super::error::{DbError, DbResult};

const IN_MEMORY: &str = ":memory:";

/// Scoped access to the open connection. Dropping it releases the handle.
pub type DbGuard<'a> = MappedMutexGuard<'a, Connection>;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Option<Connection>>>,
    path: Arc<str>,
}

impl Database {
    /// Create a handle for the database at `path`. Nothing is opened until first use.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            conn: Arc::new(Mutex::new(None)),
            path: Arc::from(path.as_ref().to_string_lossy().as_ref()),
        }
    }

    /// Create a handle for a private in-memory database
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY)
    }

    /// Get the database path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Open the connection if it is not open yet.
    pub async fn open(&self) -> DbResult<()> {
        self.lock().await.map(|_| ())
    }

    /// Lock the shared connection, opening it first if needed.
    ///
    /// Concurrent callers queue on the same mutex, so the first one opens the
    /// connection and every later one observes it. If opening fails the slot
    /// stays empty and the next call tries again.
    pub async fn lock(&self) -> DbResult<DbGuard<'_>> {
        let mut slot = self.conn.lock().await;
        if slot.is_none() {
            *slot = Some(self.connect()?);
        }
        MutexGuard::try_map(slot, Option::as_mut).map_err(|_| DbError::NotOpen)
    }

    /// Close the connection. A later `lock` or `open` re-opens it.
    pub async fn close(&self) -> DbResult<()> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.take() {
            conn.close().map_err(|(_, e)| DbError::Sqlite(e))?;
            info!("Database closed at {}", self.path);
        }
        Ok(())
    }

    pub async fn is_open(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Check if database is accessible (for health checks)
    pub async fn health_check(&self) -> DbResult<bool> {
        let conn = self.lock().await?;
        match conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)) {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!("Database health check failed: {}", e);
                Ok(false)
            }
        }
    }

    fn connect(&self) -> DbResult<Connection> {
        let conn = if self.path() == IN_MEMORY {
            Connection::open_in_memory()?
        } else {
            let path = Path::new(self.path());
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Connection::open(path)?
        };

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        info!("Database opened at {}", self.path);
        Ok(conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}
