//! Carries out engine effects and drives the event loop.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;

use tracing::{debug, warn};

use super::engine::{Effect, TimerEngine, TimerEvent};
use super::snapshot::Status;
use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::integrations::{CommandRunner, Notifier, Renderer, SoundPlayer};
use crate::storage::SessionStore;

/// Side-effecting services the dispatcher hands work to.
#[derive(Clone, Copy)]
pub struct Capabilities<'a> {
    pub notifier: &'a dyn Notifier,
    pub sound: &'a dyn SoundPlayer,
    pub command: &'a dyn CommandRunner,
}

/// Executes [`Effect`]s against the store, the capabilities and the status
/// file.
///
/// Store failures are returned as errors and end the run. Audio,
/// notification and status-file failures are logged and swallowed.
pub struct Dispatcher<'a> {
    store: &'a mut dyn SessionStore,
    caps: Capabilities<'a>,
    status_path: Option<PathBuf>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(store: &'a mut dyn SessionStore, caps: Capabilities<'a>) -> Self {
        Self {
            store,
            caps,
            status_path: None,
        }
    }

    /// Also maintain the status file at `path`.
    pub fn with_status_file(mut self, path: PathBuf) -> Self {
        self.status_path = Some(path);
        self
    }

    pub fn store(&self) -> &dyn SessionStore {
        &*self.store
    }

    /// Run `effects` in order.
    ///
    /// Returns `Ok(Some(err))` when the session command failed; the caller
    /// reports it and tells the engine.
    pub fn execute(&mut self, effects: Vec<Effect>) -> Result<Option<CoreError>> {
        let mut command_failure = None;
        for effect in effects {
            debug!(?effect, "dispatching");
            match effect {
                Effect::PersistSession(session) => self.store.put_session(&session)?,
                Effect::PersistTimer(timer) => self.store.put_timer(&timer)?,
                Effect::ReleaseStore => self.store.close()?,
                Effect::AcquireStore => self.store.reopen()?,
                Effect::RunSessionCmd(cmd) => {
                    if let Err(e) = self.caps.command.run(&cmd) {
                        warn!(error = %e, "session command failed");
                        command_failure = Some(e);
                    }
                }
                Effect::Notify { title, body } => {
                    advisory("notification", self.caps.notifier.notify(&title, &body))
                }
                Effect::PlayAlert(sound) => {
                    advisory("alert sound", self.caps.sound.play_alert(&sound))
                }
                Effect::StartAmbient(sound) => {
                    advisory("ambient sound", self.caps.sound.start_ambient(&sound))
                }
                Effect::StopAmbient => advisory("ambient sound", self.caps.sound.stop_ambient()),
                Effect::PauseAmbient => advisory("ambient sound", self.caps.sound.pause_ambient()),
                Effect::ResumeAmbient => {
                    advisory("ambient sound", self.caps.sound.resume_ambient())
                }
                Effect::WriteStatus(status) => {
                    if let Some(path) = &self.status_path {
                        advisory("status file", status.write(path));
                    }
                }
                Effect::ClearStatus => self.clear_status(),
            }
        }
        Ok(command_failure)
    }

    fn clear_status(&self) {
        if let Some(path) = &self.status_path {
            advisory("status file", Status::clear(path));
        }
    }
}

fn advisory(what: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!(error = %e, "{what} failed");
    }
}

/// Owns an engine and feeds it events until it terminates.
pub struct Runner<'a> {
    engine: TimerEngine,
    dispatcher: Dispatcher<'a>,
    renderer: &'a mut dyn Renderer,
    clock: &'a dyn Clock,
}

impl<'a> Runner<'a> {
    pub fn new(
        engine: TimerEngine,
        dispatcher: Dispatcher<'a>,
        renderer: &'a mut dyn Renderer,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            engine,
            dispatcher,
            renderer,
            clock,
        }
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.dispatcher.store()
    }

    /// Handle one event plus the follow-ups it triggers (auto-start, or
    /// the command-failure notice), rendering after each.
    pub fn step(&mut self, event: TimerEvent) -> Result<()> {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let effects = self.engine.handle(event, self.clock);
            match self.dispatcher.execute(effects) {
                Ok(Some(err)) => {
                    self.renderer.report(&err);
                    queue.push_back(TimerEvent::CommandFailed);
                }
                Ok(None) if self.engine.auto_start_pending() => {
                    queue.push_back(TimerEvent::AutoStart);
                }
                Ok(None) => {}
                Err(e) => {
                    self.dispatcher.clear_status();
                    return Err(e);
                }
            }
            self.renderer.render(&self.engine.view(self.clock.now()));
        }
        Ok(())
    }

    /// Start the engine and process `events` until it terminates.
    ///
    /// A closed channel counts as an interrupt.
    pub fn run(mut self, events: &Receiver<TimerEvent>) -> Result<TimerEngine> {
        self.step(TimerEvent::Start)?;
        while !self.engine.is_terminated() {
            let event = events.recv().unwrap_or(TimerEvent::Interrupt);
            self.step(event)?;
        }
        Ok(self.engine)
    }
}
