//! SQLite-backed session store.
//!
//! Two tables hold JSON-encoded records:
//! - `sessions(key, value)`: work sessions keyed by start time
//! - `timers(key, value)`: suspended timers keyed by pause time
//!
//! Both are `WITHOUT ROWID`, so the primary key is the storage order and
//! range scans walk the B-tree directly.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::lock::{FileLock, LOCK_TIMEOUT};
use super::{keep_matching, migrations, SessionStore};
use crate::error::{DatabaseError, Result};
use crate::session::Session;
use crate::timer::SuspendedTimer;
use crate::timeutil;

/// SQLite database for sessions and suspended timers.
///
/// Holds the exclusive writer lock for as long as it is open.
pub struct SqliteStore {
    path: PathBuf,
    conn: Option<Connection>,
    lock: Option<FileLock>,
}

impl SqliteStore {
    /// Open the database at `path`, creating and migrating it as needed.
    ///
    /// # Errors
    /// [`crate::error::CoreError::AlreadyRunning`] if another process holds
    /// the lock for more than a second, or a database error if the file
    /// cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        let mut store = Self {
            path: path.to_path_buf(),
            conn: None,
            lock: None,
        };
        store.reopen()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or_else(|| DatabaseError::Closed.into())
    }

    fn decode_sessions(rows: Vec<String>) -> Result<Vec<Session>> {
        rows.iter()
            .map(|v| serde_json::from_str(v).map_err(Into::into))
            .collect()
    }
}

impl SessionStore for SqliteStore {
    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| DatabaseError::from(e))?;
            debug!(path = %self.path.display(), "closed store");
        }
        self.lock = None;
        Ok(())
    }

    fn reopen(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let lock = FileLock::acquire(&self.path, LOCK_TIMEOUT)?;
        let conn = Connection::open(&self.path).map_err(|source| DatabaseError::OpenFailed {
            path: self.path.clone(),
            source,
        })?;
        migrations::migrate(&conn)?;
        info!(path = %self.path.display(), "opened store");
        self.lock = Some(lock);
        self.conn = Some(conn);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn put_session(&mut self, session: &Session) -> Result<()> {
        let value = serde_json::to_string(session)?;
        self.conn()?.execute(
            "INSERT OR REPLACE INTO sessions (key, value) VALUES (?1, ?2)",
            params![session.key(), value],
        )?;
        Ok(())
    }

    fn get_session(&self, key: &str) -> Result<Option<Session>> {
        let value: Option<String> = self
            .conn()?
            .query_row(
                "SELECT value FROM sessions WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        value
            .map(|v| serde_json::from_str(&v).map_err(Into::into))
            .transpose()
    }

    fn update_sessions(&mut self, sessions: &[Session]) -> Result<()> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT OR REPLACE INTO sessions (key, value) VALUES (?1, ?2)")?;
            for s in sessions {
                stmt.execute(params![s.key(), serde_json::to_string(s)?])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_sessions_in_range(
        &self,
        from: DateTime<Local>,
        to: DateTime<Local>,
        tags: &[String],
    ) -> Result<Vec<Session>> {
        let conn = self.conn()?;
        let (from_key, to_key) = (timeutil::to_key(&from), timeutil::to_key(&to));

        let preceding: Option<String> = conn
            .query_row(
                "SELECT value FROM sessions WHERE key < ?1 ORDER BY key DESC LIMIT 1",
                params![from_key],
                |row| row.get(0),
            )
            .optional()?;
        let preceding = preceding
            .map(|v| serde_json::from_str::<Session>(&v))
            .transpose()?;

        let mut stmt = conn.prepare(
            "SELECT value FROM sessions WHERE key >= ?1 AND key <= ?2 ORDER BY key",
        )?;
        let rows = stmt
            .query_map(params![from_key, to_key], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(keep_matching(preceding, Self::decode_sessions(rows)?, from, tags))
    }

    fn delete_sessions(&mut self, keys: &[String]) -> Result<()> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        for key in keys {
            tx.execute("DELETE FROM sessions WHERE key = ?1", params![key])?;
        }
        tx.commit()?;
        Ok(())
    }

    fn put_timer(&mut self, timer: &SuspendedTimer) -> Result<()> {
        let value = serde_json::to_string(timer)?;
        self.conn()?.execute(
            "INSERT OR REPLACE INTO timers (key, value) VALUES (?1, ?2)",
            params![timer.key(), value],
        )?;
        Ok(())
    }

    fn list_timers(&self) -> Result<Vec<SuspendedTimer>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM timers ORDER BY key DESC")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.iter()
            .map(|v| serde_json::from_str(v).map_err(Into::into))
            .collect()
    }

    fn delete_timer(&mut self, key: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM timers WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn delete_all_timers(&mut self) -> Result<()> {
        self.conn()?.execute("DELETE FROM timers", [])?;
        Ok(())
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
