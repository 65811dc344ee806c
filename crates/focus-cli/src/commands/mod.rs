pub mod config;
pub mod sessions;
pub mod stats;
pub mod status;
pub mod suspended;
pub mod timer;

use std::io::{self, BufRead, Write};

use chrono::{DateTime, Local};
use clap::Args;
use focus_core::session::parse_tags;
use focus_core::{Filter, Paths, SqliteStore};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Bounds shared by `stats`, `list`, `edit-tag` and `delete`.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Start date (YYYY-MM-DD [HH:MM:SS PM])
    #[arg(long, value_name = "DATE")]
    pub start: Option<String>,
    /// End date (YYYY-MM-DD [HH:MM:SS PM])
    #[arg(long, value_name = "DATE")]
    pub end: Option<String>,
    /// today, yesterday, 7days, 14days, 30days, 90days, 180days, 365days or all-time
    #[arg(long, short = 'p')]
    pub period: Option<String>,
    /// Only sessions carrying any of these comma separated tags
    #[arg(long, short = 't', value_name = "TAGS")]
    pub tag: Option<String>,
}

impl FilterArgs {
    pub fn resolve(&self, now: DateTime<Local>) -> focus_core::Result<Filter> {
        Filter::resolve(
            self.period.as_deref(),
            self.start.as_deref(),
            self.end.as_deref(),
            self.tag.as_deref().map(parse_tags).unwrap_or_default(),
            now,
        )
    }
}

pub fn open_store(paths: &Paths) -> focus_core::Result<SqliteStore> {
    SqliteStore::open(&paths.db())
}

/// Ask a yes/no question on stdin. Anything but `y`/`yes` is a no.
pub fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Read a line from stdin after printing `prompt`.
pub fn prompt_line(prompt: &str) -> io::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
