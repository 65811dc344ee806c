//! Desktop notifications through the platform's notification tool.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use super::traits::Notifier;
use crate::error::{CoreError, Result};

/// Sends notifications with `notify-send` on Linux and `osascript` on macOS.
#[derive(Debug, Clone, Default)]
pub struct DesktopNotifier {
    icon: Option<PathBuf>,
}

impl DesktopNotifier {
    pub fn new(icon: Option<PathBuf>) -> Self {
        Self {
            icon: icon.filter(|p| p.exists()),
        }
    }

    fn command(&self, title: &str, body: &str) -> Command {
        if cfg!(target_os = "macos") {
            let script = format!(
                "display notification {} with title {}",
                applescript_string(body),
                applescript_string(title)
            );
            let mut cmd = Command::new("osascript");
            cmd.arg("-e").arg(script);
            cmd
        } else {
            let mut cmd = Command::new("notify-send");
            cmd.arg("--app-name=focus");
            if let Some(icon) = &self.icon {
                cmd.arg(format!("--icon={}", icon.display()));
            }
            cmd.arg(title).arg(body);
            cmd
        }
    }
}

fn applescript_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        let status = self
            .command(title, body)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| CoreError::NotifyFailure(e.to_string()))?;
        if !status.success() {
            return Err(CoreError::NotifyFailure(format!(
                "notifier exited with {status}"
            )));
        }
        Ok(())
    }
}
