//! Post-session command hook.

use std::process::{Command, Stdio};

use tracing::info;

use super::traits::CommandRunner;
use crate::error::{CoreError, Result};

/// Splits the command like a POSIX shell would and runs it directly,
/// sharing the terminal with the timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellCommandRunner;

impl CommandRunner for ShellCommandRunner {
    fn run(&self, command: &str) -> Result<()> {
        let fail = |message: String| CoreError::CommandFailed {
            command: command.to_string(),
            message,
        };

        let argv = shell_words::split(command).map_err(|e| fail(e.to_string()))?;
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| fail("command is empty".to_string()))?;

        info!(command, "running session command");
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| fail(e.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            Err(fail(match status.code() {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by a signal".to_string(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_command() {
        ShellCommandRunner.run("true").unwrap();
    }

    #[test]
    fn quoted_arguments_are_kept_together() {
        ShellCommandRunner.run("sh -c 'test \"$0\" = \"a b\"' 'a b'").unwrap();
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let err = ShellCommandRunner.run("sh -c 'exit 3'").unwrap_err();
        match err {
            CoreError::CommandFailed { message, .. } => assert!(message.contains('3')),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unbalanced_quotes_and_missing_programs_fail() {
        assert!(ShellCommandRunner.run("echo 'oops").is_err());
        assert!(ShellCommandRunner.run("").is_err());
        assert!(ShellCommandRunner.run("definitely-not-a-real-program-xyz").is_err());
    }
}
