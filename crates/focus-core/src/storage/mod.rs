//! Ordered key-value persistence for sessions and suspended timers.
//!
//! Sessions are keyed by their start time and timers by their pause time,
//! both encoded with [`crate::timeutil::to_key`], so key order is
//! chronological order. Two backends satisfy the same contract: SQLite on
//! disk and a `BTreeMap` in memory.

pub mod database;
pub mod lock;
pub mod memory;
pub mod migrations;

pub use database::SqliteStore;
pub use lock::{probe_running, FileLock};
pub use memory::MemoryStore;

use chrono::{DateTime, Local};

use crate::error::Result;
use crate::session::Session;
use crate::timer::SuspendedTimer;

/// Storage capability the engine and the commands work against.
///
/// Writes are all-or-nothing per call. Every call on a closed store fails
/// with [`crate::error::DatabaseError::Closed`].
pub trait SessionStore {
    /// Release the lock and the underlying handle. Idempotent.
    fn close(&mut self) -> Result<()>;

    /// Take the lock again after [`SessionStore::close`].
    fn reopen(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Upsert keyed by `start_time`.
    fn put_session(&mut self, session: &Session) -> Result<()>;

    fn get_session(&self, key: &str) -> Result<Option<Session>>;

    /// Upsert a batch in one transaction.
    fn update_sessions(&mut self, sessions: &[Session]) -> Result<()>;

    /// Sessions whose `[start_time, end_time]` intersects `[from, to]`, in key
    /// order, optionally limited to those carrying any of `tags`.
    ///
    /// The record just before `from` is included when it ends at or after
    /// `from`.
    fn get_sessions_in_range(
        &self,
        from: DateTime<Local>,
        to: DateTime<Local>,
        tags: &[String],
    ) -> Result<Vec<Session>>;

    fn delete_sessions(&mut self, keys: &[String]) -> Result<()>;

    /// Upsert keyed by `paused_time`.
    fn put_timer(&mut self, timer: &SuspendedTimer) -> Result<()>;

    fn get_most_recent_timer(&self) -> Result<Option<SuspendedTimer>> {
        Ok(self.list_timers()?.into_iter().next())
    }

    /// All suspended timers, newest first.
    fn list_timers(&self) -> Result<Vec<SuspendedTimer>>;

    fn delete_timer(&mut self, key: &str) -> Result<()>;

    fn delete_all_timers(&mut self) -> Result<()>;
}

/// Shared post-filter for both backends.
fn keep_matching(
    preceding: Option<Session>,
    rest: Vec<Session>,
    from: DateTime<Local>,
    tags: &[String],
) -> Vec<Session> {
    preceding
        .filter(|s| s.end_time >= from)
        .into_iter()
        .chain(rest)
        .filter(|s| s.matches_tags(tags))
        .collect()
}
