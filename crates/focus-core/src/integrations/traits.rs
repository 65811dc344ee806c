use crate::error::{CoreError, Result};
use crate::timer::TimerView;

/// Desktop notification delivery.
pub trait Notifier {
    fn notify(&self, title: &str, body: &str) -> Result<()>;
}

/// Alert and ambient sound playback. Playback happens off the main loop;
/// these calls only hand work to it.
pub trait SoundPlayer {
    /// Play `sound` once.
    fn play_alert(&self, sound: &str) -> Result<()>;

    /// Loop `sound` until stopped, replacing any ambient sound already playing.
    fn start_ambient(&self, sound: &str) -> Result<()>;

    fn stop_ambient(&self) -> Result<()>;

    fn pause_ambient(&self) -> Result<()> {
        self.stop_ambient()
    }

    fn resume_ambient(&self) -> Result<()> {
        Ok(())
    }
}

/// Runs the post-session command.
pub trait CommandRunner {
    /// Run `command` to completion with inherited stdio.
    ///
    /// # Errors
    /// [`CoreError::CommandFailed`] if it cannot be parsed or spawned, or
    /// exits non-zero.
    fn run(&self, command: &str) -> Result<()>;
}

/// Draws the timer. Called after every event the engine handles.
pub trait Renderer {
    fn render(&mut self, view: &TimerView);

    /// Show an error without stopping the loop.
    fn report(&mut self, err: &CoreError);
}

/// Capability that does nothing; for tests and `--disable-notification`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Noop;

impl Notifier for Noop {
    fn notify(&self, _title: &str, _body: &str) -> Result<()> {
        Ok(())
    }
}

impl SoundPlayer for Noop {
    fn play_alert(&self, _sound: &str) -> Result<()> {
        Ok(())
    }

    fn start_ambient(&self, _sound: &str) -> Result<()> {
        Ok(())
    }

    fn stop_ambient(&self) -> Result<()> {
        Ok(())
    }
}

impl CommandRunner for Noop {
    fn run(&self, _command: &str) -> Result<()> {
        Ok(())
    }
}

impl Renderer for Noop {
    fn render(&mut self, _view: &TimerView) {}

    fn report(&mut self, _err: &CoreError) {}
}
