use clap::Args;
use focus_core::storage::SessionStore;
use focus_core::timeutil::format_clock;
use focus_core::timer::{suspended_entries, SuspendedEntry};
use focus_core::{CoreError, Paths};
use tracing::info;

use super::{confirm, open_store, CmdResult};

#[derive(Args, Debug, Clone)]
pub struct DeleteTimerArgs {
    /// Delete every suspended timer
    #[arg(long, short = 'a', conflicts_with = "index")]
    pub all: bool,
    /// Positions as shown by the listing (1 is the most recent)
    pub index: Vec<usize>,
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

const DATE: &str = "%Y-%m-%d %H:%M:%S";

fn row(position: usize, e: &SuspendedEntry) -> String {
    let started = e
        .session_start
        .map(|t| t.format(DATE).to_string())
        .unwrap_or_else(|| "-".to_string());
    let remaining = e
        .remaining
        .map(|d| format!(" -> {}", format_clock(d)))
        .unwrap_or_default();
    format!(
        "{:>3}  {:<19}  {:<19}  {}/{}{:<9}  {}",
        position,
        e.paused_at.format(DATE),
        started,
        e.work_cycle,
        e.long_break_interval,
        remaining,
        e.tags.join(", ")
    )
}

/// Table of suspended timers, newest first.
pub fn print_entries(entries: &[SuspendedEntry]) {
    println!(
        "{:>3}  {:<19}  {:<19}  {:<13}  TAGS",
        "#", "PAUSED AT", "SESSION START", "CYCLE"
    );
    for (i, e) in entries.iter().enumerate() {
        println!("{}", row(i + 1, e));
    }
}

pub fn run(paths: &Paths, args: DeleteTimerArgs) -> CmdResult {
    let mut store = open_store(paths)?;
    let entries = suspended_entries(&store)?;
    if entries.is_empty() {
        return Err(CoreError::NoSuspendedSession.into());
    }

    if args.all {
        if args.yes || confirm(&format!("Delete all {} suspended timers?", entries.len()))? {
            store.delete_all_timers()?;
            info!(count = entries.len(), "deleted all suspended timers");
            println!("Deleted {} suspended timer(s)", entries.len());
        }
        return Ok(());
    }

    if args.index.is_empty() {
        print_entries(&entries);
        return Ok(());
    }

    let mut positions = args.index.clone();
    positions.sort_unstable();
    positions.dedup();
    let mut chosen = Vec::new();
    for i in positions {
        let entry = i
            .checked_sub(1)
            .and_then(|i| entries.get(i))
            .ok_or_else(|| CoreError::invalid(format!("there is no suspended timer #{i}")))?;
        println!("{}", row(i, entry));
        chosen.push(entry);
    }

    if args.yes || confirm(&format!("Delete {} suspended timer(s)?", chosen.len()))? {
        for e in &chosen {
            store.delete_timer(&e.key)?;
        }
        info!(count = chosen.len(), "deleted suspended timers");
        println!("Deleted {} suspended timer(s)", chosen.len());
    }
    Ok(())
}
