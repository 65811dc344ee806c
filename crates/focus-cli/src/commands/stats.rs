use clap::Args;
use focus_core::storage::SessionStore;
use focus_core::{aggregate, Clock, Paths, SystemClock};
use tracing::debug;

use super::{open_store, CmdResult, FilterArgs};

#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(paths: &Paths, args: StatsArgs) -> CmdResult {
    let filter = args.filter.resolve(SystemClock::new().now())?;
    let store = open_store(paths)?;
    let sessions =
        store.get_sessions_in_range(filter.window.start, filter.window.end, &filter.tags)?;
    debug!(count = sessions.len(), "aggregating sessions");

    let stats = aggregate(&sessions, &filter.window);
    if args.json {
        println!("{}", stats.to_json()?);
    } else {
        print!("{}", stats.render_report());
    }
    Ok(())
}
