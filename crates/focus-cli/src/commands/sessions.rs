use clap::Args;
use crossterm::style::Stylize;
use focus_core::session::parse_tags;
use focus_core::storage::SessionStore;
use focus_core::{Clock, Paths, Session, SqliteStore, SystemClock};
use tracing::info;

use super::{confirm, open_store, CmdResult, FilterArgs};
use crate::ui::color_enabled;

const NO_SESSIONS: &str = "No sessions found for the specified time range";
const DATE: &str = "%b %d, %Y %I:%M %p";

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Print the sessions as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EditTagArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
    /// New tags; replaces the existing ones
    #[arg(required = true, value_name = "TAG")]
    pub tags: Vec<String>,
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

fn matching(paths: &Paths, filter: &FilterArgs) -> focus_core::Result<(SqliteStore, Vec<Session>)> {
    let filter = filter.resolve(SystemClock::new().now())?;
    let store = open_store(paths)?;
    let sessions =
        store.get_sessions_in_range(filter.window.start, filter.window.end, &filter.tags)?;
    Ok((store, sessions))
}

/// Sessions as a numbered table.
fn print_table(sessions: &[Session]) {
    let color = color_enabled(false);
    println!(
        "{:>4}  {:<22}  {:<22}  {:<10}  TAGS",
        "#", "START DATE", "END DATE", "STATUS"
    );
    for (i, s) in sessions.iter().enumerate() {
        let status = match (s.completed, color) {
            (true, true) => format!("{:<10}", "completed").green().to_string(),
            (false, true) => format!("{:<10}", "abandoned").red().to_string(),
            (true, false) => format!("{:<10}", "completed"),
            (false, false) => format!("{:<10}", "abandoned"),
        };
        println!(
            "{:>4}  {:<22}  {:<22}  {}  {}",
            i + 1,
            s.start_time.format(DATE).to_string(),
            s.end_time.format(DATE).to_string(),
            status,
            s.tags.join(" · ")
        );
    }
}

pub fn list(paths: &Paths, args: ListArgs) -> CmdResult {
    let (_store, sessions) = matching(paths, &args.filter)?;
    if args.json {
        println!("{}", serde_json::to_string(&sessions)?);
        return Ok(());
    }
    if sessions.is_empty() {
        println!("{NO_SESSIONS}");
        return Ok(());
    }
    print_table(&sessions);
    Ok(())
}

pub fn edit_tags(paths: &Paths, args: EditTagArgs) -> CmdResult {
    let (mut store, mut sessions) = matching(paths, &args.filter)?;
    if sessions.is_empty() {
        println!("{NO_SESSIONS}");
        return Ok(());
    }

    let tags: Vec<String> = args.tags.iter().flat_map(|t| parse_tags(t)).collect();
    for s in &mut sessions {
        s.tags = tags.clone();
    }
    print_table(&sessions);

    if args.yes || confirm("The sessions above will be updated. Proceed?")? {
        store.update_sessions(&sessions)?;
        info!(count = sessions.len(), ?tags, "retagged sessions");
        println!("Updated {} session(s)", sessions.len());
    }
    Ok(())
}

pub fn delete(paths: &Paths, args: DeleteArgs) -> CmdResult {
    let (mut store, sessions) = matching(paths, &args.filter)?;
    if sessions.is_empty() {
        println!("{NO_SESSIONS}");
        return Ok(());
    }
    print_table(&sessions);

    if args.yes || confirm("The sessions above will be deleted permanently. Proceed?")? {
        let keys: Vec<String> = sessions.iter().map(Session::key).collect();
        store.delete_sessions(&keys)?;
        info!(count = keys.len(), "deleted sessions");
        println!("Deleted {} session(s)", keys.len());
    }
    Ok(())
}
