use clap::{Parser, Subcommand};
use focus_core::{logging, Paths};

mod commands;
mod ui;

use commands::sessions::{DeleteArgs, EditTagArgs, ListArgs};
use commands::stats::StatsArgs;
use commands::suspended::DeleteTimerArgs;
use commands::timer::{ResumeArgs, TimerArgs};
use commands::CmdResult;

#[derive(Parser)]
#[command(
    name = "focus",
    version,
    about = "A Pomodoro timer for the command line",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    timer: TimerArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Resume a suspended timer
    Resume(ResumeArgs),
    /// Show statistics for a time range
    Stats(StatsArgs),
    /// List work sessions in a time range
    List(ListArgs),
    /// Replace the tags of the sessions in a time range
    EditTag(EditTagArgs),
    /// Delete the sessions in a time range
    Delete(DeleteArgs),
    /// Open the config file in $VISUAL or $EDITOR
    EditConfig,
    /// Print the status of the running timer
    Status,
    /// List or delete suspended timers
    DeleteTimer(DeleteTimerArgs),
}

fn run(cli: Cli) -> CmdResult {
    let paths = Paths::resolve()?;
    paths.ensure()?;
    let _log = logging::init(&paths)?;

    match cli.command {
        None => commands::timer::run(&paths, cli.timer),
        Some(Commands::Resume(args)) => commands::timer::resume(&paths, args),
        Some(Commands::Stats(args)) => commands::stats::run(&paths, args),
        Some(Commands::List(args)) => commands::sessions::list(&paths, args),
        Some(Commands::EditTag(args)) => commands::sessions::edit_tags(&paths, args),
        Some(Commands::Delete(args)) => commands::sessions::delete(&paths, args),
        Some(Commands::EditConfig) => commands::config::edit(&paths),
        Some(Commands::Status) => commands::status::run(&paths),
        Some(Commands::DeleteTimer(args)) => commands::suspended::run(&paths, args),
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
