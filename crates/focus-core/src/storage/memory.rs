//! In-memory store with the same ordering and range rules as SQLite.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};

use super::{keep_matching, SessionStore};
use crate::error::{DatabaseError, Result};
use crate::session::Session;
use crate::timer::SuspendedTimer;
use crate::timeutil;

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    sessions: BTreeMap<String, Session>,
    timers: BTreeMap<String, SuspendedTimer>,
    closed: bool,
    /// How many times the store was closed; lets tests check lock release.
    pub close_count: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(DatabaseError::Closed.into());
        }
        Ok(())
    }

    /// Every stored session in key order, open or not.
    pub fn all_sessions(&self) -> Vec<Session> {
        self.sessions.values().cloned().collect()
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }
}

impl SessionStore for MemoryStore {
    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.close_count += 1;
        }
        Ok(())
    }

    fn reopen(&mut self) -> Result<()> {
        self.closed = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed
    }

    fn put_session(&mut self, session: &Session) -> Result<()> {
        self.check_open()?;
        self.sessions.insert(session.key(), session.clone());
        Ok(())
    }

    fn get_session(&self, key: &str) -> Result<Option<Session>> {
        self.check_open()?;
        Ok(self.sessions.get(key).cloned())
    }

    fn update_sessions(&mut self, sessions: &[Session]) -> Result<()> {
        self.check_open()?;
        for s in sessions {
            self.sessions.insert(s.key(), s.clone());
        }
        Ok(())
    }

    fn get_sessions_in_range(
        &self,
        from: DateTime<Local>,
        to: DateTime<Local>,
        tags: &[String],
    ) -> Result<Vec<Session>> {
        self.check_open()?;
        let (from_key, to_key) = (timeutil::to_key(&from), timeutil::to_key(&to));

        let preceding = self
            .sessions
            .range(..from_key.clone())
            .next_back()
            .map(|(_, s)| s.clone());
        let rest = if from_key <= to_key {
            self.sessions
                .range(from_key..=to_key)
                .map(|(_, s)| s.clone())
                .collect()
        } else {
            Vec::new()
        };

        Ok(keep_matching(preceding, rest, from, tags))
    }

    fn delete_sessions(&mut self, keys: &[String]) -> Result<()> {
        self.check_open()?;
        for key in keys {
            self.sessions.remove(key);
        }
        Ok(())
    }

    fn put_timer(&mut self, timer: &SuspendedTimer) -> Result<()> {
        self.check_open()?;
        self.timers.insert(timer.key(), timer.clone());
        Ok(())
    }

    fn list_timers(&self) -> Result<Vec<SuspendedTimer>> {
        self.check_open()?;
        Ok(self.timers.values().rev().cloned().collect())
    }

    fn delete_timer(&mut self, key: &str) -> Result<()> {
        self.check_open()?;
        self.timers.remove(key);
        Ok(())
    }

    fn delete_all_timers(&mut self) -> Result<()> {
        self.check_open()?;
        self.timers.clear();
        Ok(())
    }
}
