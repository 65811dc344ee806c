//! # Focus Core Library
//!
//! Core logic for the `focus` Pomodoro timer. The CLI binary is a thin layer
//! over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: a reducer over [`TimerEvent`]s that returns
//!   [`Effect`]s; a [`Dispatcher`] carries them out and a [`Runner`] drives
//!   the loop
//! - **Storage**: ordered key-value persistence of sessions and suspended
//!   timers, in SQLite or in memory
//! - **Statistics**: minute-precision aggregation over a query window
//! - **Integrations**: notifications, sounds and the post-session command,
//!   each behind a small trait
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: timer state machine
//! - [`SqliteStore`]: session persistence
//! - [`Config`]: YAML configuration
//! - [`Stats`]: aggregated report

pub mod clock;
pub mod config;
pub mod error;
pub mod integrations;
pub mod logging;
pub mod session;
pub mod stats;
pub mod storage;
pub mod timer;
pub mod timeutil;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, Paths, TimerOptions, TimerOverrides};
pub use error::{ConfigError, CoreError, DatabaseError, Result};
pub use session::{Segment, Session, SessionName};
pub use stats::{aggregate, Filter, Period, QueryWindow, Stats};
pub use storage::{MemoryStore, SessionStore, SqliteStore};
pub use timer::{
    Capabilities, Dispatcher, Effect, Runner, Status, SuspendedTimer, TimerEngine, TimerEvent,
    TimerState, TimerView,
};
