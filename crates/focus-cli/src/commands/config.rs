use std::process::Command;

use focus_core::{Config, CoreError, Paths};
use tracing::info;

use super::CmdResult;

const DEFAULT_EDITOR: &str = "nano";

/// `$VISUAL`, then `$EDITOR`, then nano.
fn editor() -> String {
    ["VISUAL", "EDITOR"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_EDITOR.to_string())
}

/// Open `config.yml` in the user's editor, then check that it still loads.
pub fn edit(paths: &Paths) -> CmdResult {
    // A broken config must still be editable, so only seed a missing one.
    if !paths.config().exists() {
        Config::default().save(paths)?;
    }

    let editor = editor();
    // Editors are often given with flags, e.g. `code --wait`.
    let argv: Vec<&str> = editor.split_whitespace().collect();
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| CoreError::invalid("editor command is empty"))?;

    info!(editor = %editor, path = %paths.config().display(), "editing config");
    let status = Command::new(program).args(args).arg(paths.config()).status()?;
    if !status.success() {
        return Err(CoreError::invalid(format!("editor `{editor}` exited with {status}")).into());
    }

    Config::load(paths)?;
    Ok(())
}
