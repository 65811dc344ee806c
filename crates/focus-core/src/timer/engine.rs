//! Timer engine implementation.
//!
//! The engine is a reducer: [`TimerEngine::handle`] takes an event and the
//! clock, updates the in-memory state and returns the side effects the
//! caller must carry out, in order. It never touches the store, the
//! speakers or the terminal itself.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!            |
//!            v
//!   AwaitingUserContinue -> Running (next session)
//!
//! any -> Terminated (Interrupt | Quit)
//! ```
//!
//! `SettingsOverlay` sits on top of Running, Paused or AwaitingUserContinue;
//! ticks keep being applied to the state underneath.

use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::snapshot::{Status, SuspendedTimer};
use crate::clock::Clock;
use crate::config::TimerOptions;
use crate::session::{Session, SessionName};

/// Wall time may run ahead of monotonic time by this much before the gap is
/// treated as a host suspend.
pub const SUSPEND_THRESHOLD: Duration = Duration::seconds(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    /// A session finished; waiting for Enter or auto-start.
    AwaitingUserContinue,
    /// Ambient sound chooser is open over another state.
    SettingsOverlay,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    Start,
    Tick,
    TogglePause,
    /// SIGINT or SIGTERM.
    Interrupt,
    UserEnter,
    /// Sent by the loop after a completion when auto-start applies.
    AutoStart,
    /// Sent by the loop when the post-session command failed.
    CommandFailed,
    SkipBreak,
    OpenSettings,
    CloseSettings,
    /// Switch the ambient sound; an empty name turns it off.
    SelectSound(String),
    Quit,
}

/// Side effects, executed in order by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    PersistSession(Session),
    PersistTimer(SuspendedTimer),
    RunSessionCmd(String),
    Notify { title: String, body: String },
    PlayAlert(String),
    StartAmbient(String),
    StopAmbient,
    PauseAmbient,
    ResumeAmbient,
    /// Close the store so another instance may start.
    ReleaseStore,
    /// Reopen the store before the next write.
    AcquireStore,
    WriteStatus(Status),
    ClearStatus,
}

/// Wall and monotonic readings taken when the current segment was opened.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    wall: DateTime<Local>,
    mono: Duration,
}

impl Anchor {
    fn take(clock: &dyn Clock) -> Self {
        Self {
            wall: clock.now(),
            mono: clock.monotonic(),
        }
    }
}

/// Snapshot of the engine for renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerView {
    pub state: TimerState,
    /// State under the settings overlay, equal to `state` otherwise.
    pub underlying: TimerState,
    pub name: SessionName,
    pub message: String,
    pub color: String,
    pub tags: Vec<String>,
    pub remaining: Duration,
    pub duration: Duration,
    /// Projected end if the session keeps running from now.
    pub end_time: DateTime<Local>,
    pub work_cycle: u32,
    pub long_break_interval: u32,
    /// Set while waiting to continue.
    pub next: Option<SessionName>,
    pub ambient_sound: String,
    pub strict: bool,
    pub twenty_four_hour_clock: bool,
}

#[derive(Debug, Clone)]
pub struct TimerEngine {
    opts: TimerOptions,
    state: TimerState,
    overlay_over: Option<TimerState>,
    work_cycle: u32,
    current: Option<Session>,
    /// Session to enter on the next Start/UserEnter/AutoStart.
    next_name: SessionName,
    /// True when `current` is an unfinished session picked up from the store.
    resuming: bool,
    auto_start_pending: bool,
    store_released: bool,
    anchor: Option<Anchor>,
}

impl TimerEngine {
    /// A fresh timer that starts with a work session.
    pub fn new(opts: TimerOptions) -> Self {
        Self {
            opts,
            state: TimerState::Idle,
            overlay_over: None,
            work_cycle: 0,
            current: None,
            next_name: SessionName::Work,
            resuming: false,
            auto_start_pending: false,
            store_released: false,
            anchor: None,
        }
    }

    /// A timer that continues `session` where it was left off.
    pub fn resume(opts: TimerOptions, work_cycle: u32, session: Session) -> Self {
        let mut engine = Self::new(opts);
        engine.work_cycle = work_cycle;
        engine.next_name = session.name;
        engine.current = Some(session);
        engine.resuming = true;
        engine
    }

    /// A fresh work session that keeps the suspended cycle position.
    pub fn restart_at_cycle(opts: TimerOptions, work_cycle: u32) -> Self {
        let mut engine = Self::new(opts);
        engine.work_cycle = work_cycle;
        engine
    }

    /// A timer whose `finished` session already completed; starts with the
    /// session that follows it in the cycle.
    pub fn after_session(opts: TimerOptions, work_cycle: u32, finished: SessionName) -> Self {
        let mut engine = Self::restart_at_cycle(opts, work_cycle);
        engine.next_name = engine.following(finished);
        engine
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// The state beneath the settings overlay.
    pub fn underlying_state(&self) -> TimerState {
        match self.state {
            TimerState::SettingsOverlay => self.overlay_over.unwrap_or(TimerState::Idle),
            s => s,
        }
    }

    pub fn work_cycle(&self) -> u32 {
        self.work_cycle
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn options(&self) -> &TimerOptions {
        &self.opts
    }

    pub fn auto_start_pending(&self) -> bool {
        self.auto_start_pending
    }

    pub fn is_terminated(&self) -> bool {
        self.state == TimerState::Terminated
    }

    pub fn view(&self, now: DateTime<Local>) -> TimerView {
        let name = self.current.as_ref().map_or(self.next_name, |s| s.name);
        let sc = self.opts.session(name);
        let remaining = self
            .current
            .as_ref()
            .map_or(sc.duration, |s| s.remaining());
        let next = (self.underlying_state() == TimerState::AwaitingUserContinue)
            .then_some(self.next_name);
        TimerView {
            state: self.state,
            underlying: self.underlying_state(),
            name,
            message: sc.message.clone(),
            color: sc.color.clone(),
            tags: self.opts.tags.clone(),
            remaining,
            duration: sc.duration,
            end_time: now + remaining,
            work_cycle: self.work_cycle,
            long_break_interval: self.opts.long_break_interval,
            next,
            ambient_sound: self.opts.ambient_sound.clone(),
            strict: self.opts.strict,
            twenty_four_hour_clock: self.opts.twenty_four_hour_clock,
        }
    }

    // ── Reducer ──────────────────────────────────────────────────────

    pub fn handle(&mut self, event: TimerEvent, clock: &dyn Clock) -> Vec<Effect> {
        if self.state == TimerState::Terminated {
            return Vec::new();
        }
        debug!(?event, state = ?self.state, "timer event");

        let mut fx = Vec::new();
        match (self.underlying_state(), event) {
            (_, TimerEvent::Quit) => self.quit(clock, &mut fx),
            (_, TimerEvent::Interrupt) => self.interrupt(clock, &mut fx),

            (TimerState::Idle, TimerEvent::Start) => self.start(clock, &mut fx),

            (TimerState::Running, TimerEvent::Tick) => self.tick(clock, &mut fx),
            (TimerState::Paused, TimerEvent::Tick) => self.push_status(clock.now(), &mut fx),

            (TimerState::Running, TimerEvent::TogglePause) if self.can_pause() => {
                self.pause(clock, &mut fx)
            }
            (TimerState::Paused, TimerEvent::TogglePause) => self.unpause(clock, &mut fx),

            (TimerState::Running | TimerState::Paused, TimerEvent::SkipBreak)
                if self.current.as_ref().is_some_and(|s| !s.name.is_work()) =>
            {
                let paused = self.underlying_state() == TimerState::Paused;
                if let Some(s) = self.current.as_mut().filter(|_| !paused) {
                    s.advance(clock.now());
                }
                self.close_overlay();
                self.enter_session(SessionName::Work, clock, &mut fx);
            }

            (TimerState::AwaitingUserContinue, TimerEvent::UserEnter) => {
                self.close_overlay();
                self.continue_to_next(clock, &mut fx)
            }
            (TimerState::AwaitingUserContinue, TimerEvent::AutoStart) if self.auto_start_pending => {
                self.close_overlay();
                self.continue_to_next(clock, &mut fx)
            }
            (TimerState::AwaitingUserContinue, TimerEvent::CommandFailed) => {
                self.auto_start_pending = false;
                self.release_store(&mut fx);
            }

            (
                TimerState::Running | TimerState::Paused | TimerState::AwaitingUserContinue,
                TimerEvent::OpenSettings,
            ) if self.state != TimerState::SettingsOverlay => {
                self.overlay_over = Some(self.state);
                self.state = TimerState::SettingsOverlay;
            }
            (_, TimerEvent::CloseSettings) => self.close_overlay(),
            (_, TimerEvent::SelectSound(name)) if self.state == TimerState::SettingsOverlay => {
                self.close_overlay();
                self.select_sound(name, &mut fx);
            }

            (state, event) => debug!(?state, ?event, "event ignored"),
        }
        fx
    }

    fn can_pause(&self) -> bool {
        !self.opts.strict && self.current.as_ref().is_some_and(|s| s.name.is_work())
    }

    fn close_overlay(&mut self) {
        if self.state == TimerState::SettingsOverlay {
            self.state = self.overlay_over.take().unwrap_or(TimerState::Idle);
        }
    }

    /// Update the underlying state, keeping the overlay open if it is.
    fn set_state(&mut self, state: TimerState) {
        if self.state == TimerState::SettingsOverlay {
            self.overlay_over = Some(state);
        } else {
            self.state = state;
        }
    }

    fn start(&mut self, clock: &dyn Clock, fx: &mut Vec<Effect>) {
        if self.resuming {
            self.resuming = false;
            let now = clock.now();
            if let Some(s) = self.current.as_mut() {
                s.open_segment(now);
                info!(name = %s.name, key = %s.key(), "resuming session");
            }
            self.anchor = Some(Anchor::take(clock));
            self.set_state(TimerState::Running);
            self.persist_current(fx);
            self.apply_ambient(fx);
            self.push_status(now, fx);
            // A resumed session may already be past its target.
            self.tick(clock, fx);
        } else {
            self.enter_session(self.next_name, clock, fx);
        }
    }

    fn enter_session(&mut self, name: SessionName, clock: &dyn Clock, fx: &mut Vec<Effect>) {
        let now = clock.now();
        if name.is_work() {
            self.work_cycle = if self.work_cycle >= self.opts.long_break_interval {
                1
            } else {
                self.work_cycle + 1
            };
        }

        let start = match self.opts.since.take() {
            Some(since) if since < now => since,
            _ => now,
        };
        let session = Session::new(name, self.opts.duration(name), self.opts.tags.clone(), start);
        info!(
            name = %name,
            cycle = self.work_cycle,
            interval = self.opts.long_break_interval,
            "session started"
        );

        self.current = Some(session);
        self.next_name = name;
        self.anchor = Some(Anchor::take(clock));
        self.auto_start_pending = false;
        self.set_state(TimerState::Running);

        self.persist_current(fx);
        self.apply_ambient(fx);
        self.push_status(now, fx);
        if start < now {
            self.tick(clock, fx);
        }
    }

    /// Bring the current segment up to now, cutting out any host suspend.
    fn catch_up(&mut self, clock: &dyn Clock) {
        let now = clock.now();
        let Some(session) = self.current.as_mut() else {
            return;
        };
        let Some(anchor) = self.anchor else {
            session.advance(now);
            return;
        };

        let wall = now - anchor.wall;
        let mono = clock.since(anchor.mono);
        let drift = wall - mono;
        session.advance(now);

        if drift > SUSPEND_THRESHOLD {
            info!(
                drift_secs = drift.num_seconds(),
                "host suspend detected, trimming segment"
            );
            session.pull_back(drift);
            session.open_segment(now);
            self.anchor = Some(Anchor::take(clock));
        }
    }

    fn tick(&mut self, clock: &dyn Clock, fx: &mut Vec<Effect>) {
        self.catch_up(clock);
        let done = self
            .current
            .as_ref()
            .is_some_and(|s| s.elapsed() >= s.duration);
        if done {
            self.complete(fx);
        } else {
            self.push_status(clock.now(), fx);
        }
    }

    fn complete(&mut self, fx: &mut Vec<Effect>) {
        let Some(session) = self.current.as_mut() else {
            return;
        };
        session.complete();
        let finished = session.name;
        info!(name = %finished, key = %session.key(), "session completed");
        self.persist_current(fx);

        let next = self.following(finished);
        if !self.opts.session_cmd.is_empty() {
            fx.push(Effect::RunSessionCmd(self.opts.session_cmd.clone()));
        }
        if self.opts.notifications {
            fx.push(Effect::Notify {
                title: format!("{finished} is finished"),
                body: self.opts.session(next).message.clone(),
            });
        }
        let alert = &self.opts.session(next).sound;
        if !alert.is_empty() {
            fx.push(Effect::PlayAlert(alert.clone()));
        }

        self.next_name = next;
        self.anchor = None;
        self.set_state(TimerState::AwaitingUserContinue);
        self.auto_start_pending = if next.is_work() {
            self.opts.auto_start_work
        } else {
            self.opts.auto_start_break
        };
        fx.push(Effect::ClearStatus);
        if !self.auto_start_pending {
            self.release_store(fx);
        }
    }

    /// Session that follows `name` in the cycle.
    fn following(&self, name: SessionName) -> SessionName {
        match name {
            SessionName::Work if self.work_cycle >= self.opts.long_break_interval => {
                SessionName::LongBreak
            }
            SessionName::Work => SessionName::ShortBreak,
            SessionName::ShortBreak | SessionName::LongBreak => SessionName::Work,
        }
    }

    fn continue_to_next(&mut self, clock: &dyn Clock, fx: &mut Vec<Effect>) {
        if self.store_released {
            fx.push(Effect::AcquireStore);
            self.store_released = false;
        }
        self.enter_session(self.next_name, clock, fx);
    }

    fn pause(&mut self, clock: &dyn Clock, fx: &mut Vec<Effect>) {
        self.catch_up(clock);
        // The target may have run out since the last tick.
        if self.current.as_ref().is_some_and(|s| s.elapsed() >= s.duration) {
            self.complete(fx);
            return;
        }
        self.anchor = None;
        self.set_state(TimerState::Paused);
        self.persist_current(fx);
        if !self.opts.ambient_sound.is_empty() {
            fx.push(Effect::PauseAmbient);
        }
        self.push_status(clock.now(), fx);
    }

    fn unpause(&mut self, clock: &dyn Clock, fx: &mut Vec<Effect>) {
        let now = clock.now();
        if let Some(s) = self.current.as_mut() {
            s.open_segment(now);
        }
        self.anchor = Some(Anchor::take(clock));
        self.set_state(TimerState::Running);
        if !self.opts.ambient_sound.is_empty() {
            fx.push(Effect::ResumeAmbient);
        }
        self.push_status(now, fx);
    }

    fn interrupt(&mut self, clock: &dyn Clock, fx: &mut Vec<Effect>) {
        let underlying = self.underlying_state();
        if underlying == TimerState::Running {
            self.catch_up(clock);
            if let Some(s) = self.current.as_mut() {
                s.normalise();
            }
        }

        if matches!(underlying, TimerState::Running | TimerState::Paused) {
            self.persist_current(fx);
            let session_key = self
                .current
                .as_ref()
                .filter(|s| s.name.is_work())
                .map(Session::key)
                .unwrap_or_default();
            let snapshot = SuspendedTimer {
                opts: self.opts.clone(),
                work_cycle: self.work_cycle,
                session_key,
                paused_time: clock.now(),
            };
            info!(key = %snapshot.key(), "suspending timer");
            fx.push(Effect::PersistTimer(snapshot));
        }
        self.shut_down(fx);
    }

    fn quit(&mut self, clock: &dyn Clock, fx: &mut Vec<Effect>) {
        if self.underlying_state() == TimerState::Running {
            self.catch_up(clock);
            if let Some(s) = self.current.as_mut() {
                s.normalise();
            }
        }
        if matches!(
            self.underlying_state(),
            TimerState::Running | TimerState::Paused
        ) {
            self.persist_current(fx);
        }
        self.shut_down(fx);
    }

    fn shut_down(&mut self, fx: &mut Vec<Effect>) {
        fx.push(Effect::StopAmbient);
        fx.push(Effect::ClearStatus);
        self.release_store(fx);
        self.overlay_over = None;
        self.anchor = None;
        self.auto_start_pending = false;
        self.state = TimerState::Terminated;
    }

    fn select_sound(&mut self, name: String, fx: &mut Vec<Effect>) {
        self.opts.ambient_sound = name;
        if self.opts.ambient_sound.is_empty() {
            fx.push(Effect::StopAmbient);
            return;
        }
        if matches!(self.state, TimerState::Running | TimerState::Paused) {
            self.apply_ambient(fx);
            if self.state == TimerState::Paused {
                fx.push(Effect::PauseAmbient);
            }
        }
    }

    fn apply_ambient(&self, fx: &mut Vec<Effect>) {
        if self.opts.ambient_sound.is_empty() {
            return;
        }
        let work = self.current.as_ref().is_some_and(|s| s.name.is_work());
        if work || self.opts.sound_on_break {
            fx.push(Effect::StartAmbient(self.opts.ambient_sound.clone()));
        } else {
            fx.push(Effect::StopAmbient);
        }
    }

    fn persist_current(&self, fx: &mut Vec<Effect>) {
        if let Some(s) = self.current.as_ref().filter(|s| s.name.is_work()) {
            fx.push(Effect::PersistSession(s.clone()));
        }
    }

    fn release_store(&mut self, fx: &mut Vec<Effect>) {
        if !self.store_released {
            self.store_released = true;
            fx.push(Effect::ReleaseStore);
        }
    }

    fn push_status(&self, now: DateTime<Local>, fx: &mut Vec<Effect>) {
        if let Some(s) = &self.current {
            fx.push(Effect::WriteStatus(Status {
                end_date: s.planned_end(now),
                name: s.name,
                tags: s.tags.clone(),
                work_cycle: self.work_cycle,
                long_break_interval: self.opts.long_break_interval,
            }));
        }
    }
}
