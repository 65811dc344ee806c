mod engine;
mod recover;
mod runner;
mod snapshot;

pub use engine::{Effect, TimerEngine, TimerEvent, TimerState, TimerView, SUSPEND_THRESHOLD};
pub use recover::{check_backfill, recover, suspended_entries, ResumeRequest, SuspendedEntry};
pub use runner::{Capabilities, Dispatcher, Runner};
pub use snapshot::{Status, SuspendedTimer};
