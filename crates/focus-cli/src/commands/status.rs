use focus_core::storage::probe_running;
use focus_core::{Clock, Paths, Status, SystemClock};

use super::CmdResult;

/// Print the running timer's countdown. Prints nothing when no timer is
/// running, so it can sit in a shell prompt or status bar.
pub fn run(paths: &Paths) -> CmdResult {
    if !probe_running(&paths.db())? {
        return Ok(());
    }
    if let Some(line) = Status::read(&paths.status())?
        .and_then(|status| status.render(SystemClock::new().now()))
    {
        println!("{line}");
    }
    Ok(())
}
