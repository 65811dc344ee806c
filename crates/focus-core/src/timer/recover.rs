//! Picking up suspended timers and guarding backfilled sessions.

use chrono::{DateTime, Duration, Local};
use tracing::info;

use super::engine::TimerEngine;
use super::snapshot::SuspendedTimer;
use crate::config::TimerOverrides;
use crate::error::{CoreError, Result};
use crate::session::{Session, SessionName};
use crate::storage::SessionStore;

/// How `resume` should pick and restart a suspended timer.
#[derive(Debug, Clone, Default)]
pub struct ResumeRequest {
    /// Zero-based position in [`SessionStore::list_timers`]; `None` means
    /// the most recent one.
    pub index: Option<usize>,
    /// Throw away the suspended progress and start over at cycle 1.
    pub reset: bool,
    pub overrides: TimerOverrides,
}

/// One row of the `resume --select` and `delete-timer` listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspendedEntry {
    pub key: String,
    pub paused_at: DateTime<Local>,
    pub session_start: Option<DateTime<Local>>,
    pub work_cycle: u32,
    pub long_break_interval: u32,
    /// Time left on the suspended work session, if there is one.
    pub remaining: Option<Duration>,
    pub tags: Vec<String>,
}

/// Describe every suspended timer, newest first.
pub fn suspended_entries(store: &dyn SessionStore) -> Result<Vec<SuspendedEntry>> {
    store
        .list_timers()?
        .into_iter()
        .map(|timer| {
            let session = linked_session(store, &timer)?;
            Ok(SuspendedEntry {
                key: timer.key(),
                paused_at: timer.paused_time,
                session_start: session.as_ref().map(|s| s.start_time),
                work_cycle: timer.work_cycle,
                long_break_interval: timer.opts.long_break_interval,
                remaining: session.as_ref().map(Session::remaining),
                tags: timer.opts.tags.clone(),
            })
        })
        .collect()
}

fn linked_session(store: &dyn SessionStore, timer: &SuspendedTimer) -> Result<Option<Session>> {
    if timer.has_session() {
        store.get_session(&timer.session_key)
    } else {
        Ok(None)
    }
}

/// Rebuild an engine from a suspended timer and delete the timer record.
///
/// The suspended session is continued when it is an unfinished work
/// session. A finished work session is followed by its break, keeping any
/// owed long break; anything else starts a fresh work session with the
/// suspended options.
///
/// # Errors
/// - [`CoreError::NoSuspendedSession`] if no timer is stored
/// - [`CoreError::InvalidInput`] if `index` is out of range
/// - [`CoreError::StrictModeRefusal`] if strict mode is on and a work
///   session was in progress
pub fn recover(store: &mut dyn SessionStore, request: &ResumeRequest) -> Result<TimerEngine> {
    let mut timers = store.list_timers()?;
    if timers.is_empty() {
        return Err(CoreError::NoSuspendedSession);
    }
    let position = request.index.unwrap_or(0);
    if position >= timers.len() {
        return Err(CoreError::invalid(format!(
            "there is no suspended timer #{}",
            position + 1
        )));
    }
    let timer = timers.swap_remove(position);

    let mut opts = timer.opts.clone();
    opts.apply_resume_overrides(&request.overrides)?;
    if request.overrides.strict {
        opts.strict = true;
    }

    let linked = linked_session(store, &timer)?.filter(|s| s.name.is_work());
    let finished_work = linked.as_ref().is_some_and(|s| s.completed);
    let in_progress = linked.filter(|s| !s.completed);
    if opts.strict && in_progress.is_some() {
        return Err(CoreError::StrictModeRefusal);
    }

    store.delete_timer(&timer.key())?;

    let engine = match in_progress {
        _ if request.reset => {
            info!(key = %timer.key(), "resetting suspended timer");
            TimerEngine::restart_at_cycle(opts, 0)
        }
        Some(session) => {
            info!(key = %session.key(), "recovered suspended session");
            TimerEngine::resume(opts, timer.work_cycle, session)
        }
        None if finished_work => {
            info!(key = %timer.key(), "suspended work session had finished, moving on to its break");
            TimerEngine::after_session(opts, timer.work_cycle, SessionName::Work)
        }
        None => {
            info!(key = %timer.key(), "suspended timer has no session to continue");
            TimerEngine::restart_at_cycle(opts, timer.work_cycle)
        }
    };
    Ok(engine)
}

/// Refuse a backfill starting at `since` if it would overlap a stored
/// session.
///
/// # Errors
/// [`CoreError::InvalidInput`] if `since` is in the future,
/// [`CoreError::SessionOverlap`] if any session intersects `[since, now]`.
pub fn check_backfill(
    store: &dyn SessionStore,
    since: DateTime<Local>,
    now: DateTime<Local>,
) -> Result<()> {
    if since > now {
        return Err(CoreError::invalid("--since cannot be in the future"));
    }
    let clash = store.get_sessions_in_range(since, now, &[])?;
    match clash.first() {
        Some(s) => Err(CoreError::SessionOverlap(
            s.start_time.format("%Y-%m-%d %H:%M:%S").to_string(),
        )),
        None => Ok(()),
    }
}
