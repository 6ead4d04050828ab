use crate::error::{Result, StudioError};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// The database file every request works against.
///
/// No connection is held between requests. Each unit of work opens its own
/// [`Session`] on a blocking thread and closes it when the work is done, so
/// concurrent requests only meet inside SQLite's own locking.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            busy_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh connection.
    pub fn open(&self) -> Result<Session> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(Session {
            conn,
            opened: Instant::now(),
        })
    }

    /// Run `work` on a new connection off the async runtime.
    pub async fn run<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> tabledesk_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let database = self.clone();
        tokio::task::spawn_blocking(move || {
            let session = database.open()?;
            work(session.connection()).map_err(StudioError::from)
        })
        .await?
    }

    /// Apply a batch of SQL, e.g. an init script or demo seed.
    pub fn apply_script(&self, script: &str) -> Result<()> {
        let session = self.open()?;
        session.connection().execute_batch(script)?;
        tracing::info!(path = %self.path.display(), bytes = script.len(), "Applied SQL script");
        Ok(())
    }
}

/// One open connection.
pub struct Session {
    conn: Connection,
    opened: Instant,
}

impl Session {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        tracing::trace!(
            elapsed_us = self.opened.elapsed().as_micros() as u64,
            "Session closed"
        );
    }
}
