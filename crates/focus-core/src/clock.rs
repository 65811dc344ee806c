//! Wall and monotonic time sources.
//!
//! The engine never calls `Local::now()` or `Instant::now()` directly; it asks a
//! [`Clock`]. Wall time and monotonic time are exposed separately so a host
//! suspend (wall clock leaps, monotonic clock does not) can be detected.

use std::sync::mpsc::Sender;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, Local};

pub trait Clock: Send + Sync {
    /// Current wall time.
    fn now(&self) -> DateTime<Local>;

    /// Monotonic time elapsed since an arbitrary fixed origin.
    fn monotonic(&self) -> Duration;

    /// Monotonic time elapsed since `mark`, a value previously returned by
    /// [`Clock::monotonic`].
    fn since(&self, mark: Duration) -> Duration {
        let elapsed = self.monotonic() - mark;
        elapsed.max(Duration::zero())
    }
}

/// The real clock.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn monotonic(&self) -> Duration {
        Duration::from_std(self.origin.elapsed()).unwrap_or_else(|_| Duration::max_value())
    }
}

/// A hand-driven clock for deterministic tests and simulations.
///
/// `advance` moves both clocks together; `jump_wall` moves only the wall
/// clock, which is what a host suspend looks like from inside the process.
#[derive(Debug)]
pub struct ManualClock {
    inner: Mutex<(DateTime<Local>, Duration)>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            inner: Mutex::new((start, Duration::zero())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.0 += by;
        guard.1 += by;
    }

    pub fn jump_wall(&self, by: Duration) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.0 += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).0
    }

    fn monotonic(&self) -> Duration {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).1
    }
}

/// Spawn a thread that sends `make()` down `tx` every `interval`.
///
/// The thread exits as soon as the receiving side hangs up.
pub fn spawn_ticker<T, F>(
    interval: StdDuration,
    tx: Sender<T>,
    make: F,
) -> std::io::Result<thread::JoinHandle<()>>
where
    T: Send + 'static,
    F: Fn() -> T + Send + 'static,
{
    thread::Builder::new()
        .name("focus-ticker".to_string())
        .spawn(move || loop {
            thread::sleep(interval);
            if tx.send(make()).is_err() {
                break;
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::mpsc;

    fn start() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
    }

    #[test]
    fn manual_clock_advances_both_sources() {
        let clock = ManualClock::new(start());
        let mark = clock.monotonic();
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), start() + Duration::minutes(5));
        assert_eq!(clock.since(mark), Duration::minutes(5));
    }

    #[test]
    fn wall_jump_leaves_monotonic_alone() {
        let clock = ManualClock::new(start());
        let mark = clock.monotonic();
        clock.jump_wall(Duration::hours(1));
        assert_eq!(clock.now(), start() + Duration::hours(1));
        assert_eq!(clock.since(mark), Duration::zero());
    }

    #[test]
    fn ticker_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel();
        let handle = spawn_ticker(StdDuration::from_millis(5), tx, || 1u8).unwrap();
        assert_eq!(rx.recv().unwrap(), 1);
        drop(rx);
        handle.join().unwrap();
    }
}
