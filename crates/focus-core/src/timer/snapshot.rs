//! What survives a process exit: suspended timers and the status file.

use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::config::TimerOptions;
use crate::error::Result;
use crate::session::SessionName;
use crate::timeutil;

/// Engine state written when a run is interrupted mid-session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendedTimer {
    pub opts: TimerOptions,
    pub work_cycle: u32,
    /// Key of the work session in progress. Empty when interrupted during a
    /// break.
    #[serde(default)]
    pub session_key: String,
    pub paused_time: DateTime<Local>,
}

impl SuspendedTimer {
    pub fn key(&self) -> String {
        timeutil::to_key(&self.paused_time)
    }

    pub fn has_session(&self) -> bool {
        !self.session_key.is_empty()
    }
}

/// Contents of `status.json`, read by `focus status` from another process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// When the current session is due to end if left running.
    pub end_date: DateTime<Local>,
    pub name: SessionName,
    #[serde(default)]
    pub tags: Vec<String>,
    pub work_cycle: u32,
    pub long_break_interval: u32,
}

impl Status {
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read the status file. A missing file is `Ok(None)`.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn clear(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// One-line summary such as `[Work 2/4]: 12:04`, or `None` once the
    /// session is overdue.
    pub fn render(&self, now: DateTime<Local>) -> Option<String> {
        let remaining = self.end_date - now;
        if remaining < chrono::Duration::zero() {
            return None;
        }
        let label = match self.name {
            SessionName::Work => format!("[Work {}/{}]", self.work_cycle, self.long_break_interval),
            SessionName::ShortBreak => "[Short break]".to_string(),
            SessionName::LongBreak => "[Long break]".to_string(),
        };
        Some(format!("{label}: {}", timeutil::format_clock(remaining)))
    }
}
