use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use clap::Args;
use focus_core::clock::spawn_ticker;
use focus_core::integrations::{
    list_sounds, AudioPlayer, DesktopNotifier, Noop, ShellCommandRunner, SoundPlayer,
};
use focus_core::session::parse_tags;
use focus_core::stats::parse_since;
use focus_core::timeutil::parse_duration;
use focus_core::timer::{check_backfill, recover, suspended_entries, ResumeRequest};
use focus_core::{
    Capabilities, Clock, Config, CoreError, Dispatcher, Paths, Runner, SqliteStore, SystemClock,
    TimerEngine, TimerEvent, TimerOptions, TimerOverrides,
};
use tracing::{info, warn};

use super::{open_store, prompt_line, CmdResult};
use crate::ui::{color_enabled, spawn_key_reader, TerminalRenderer};

/// Flags accepted when starting (and, partly, when resuming) a timer.
#[derive(Args, Debug, Clone, Default)]
pub struct TimerArgs {
    /// Work session length (e.g. 25, 25m, 1h30m)
    #[arg(long, short = 'w', value_name = "DURATION")]
    pub work: Option<String>,
    /// Short break length
    #[arg(long, short = 's', value_name = "DURATION")]
    pub short_break: Option<String>,
    /// Long break length
    #[arg(long, short = 'l', value_name = "DURATION")]
    pub long_break: Option<String>,
    /// Work sessions before a long break (4-10)
    #[arg(long, value_name = "COUNT")]
    pub long_break_interval: Option<u32>,
    /// Comma separated tags for the work sessions
    #[arg(long, short = 't', value_name = "TAGS")]
    pub tag: Option<String>,
    /// Ambient sound for every session, or `off`
    #[arg(long, value_name = "NAME")]
    pub sound: Option<String>,
    /// Alert played when a work session starts, or `off`
    #[arg(long, value_name = "NAME")]
    pub work_sound: Option<String>,
    /// Alert played when a break starts, or `off`
    #[arg(long, value_name = "NAME")]
    pub break_sound: Option<String>,
    /// Keep the ambient sound playing during breaks
    #[arg(long, value_name = "BOOL")]
    pub sound_on_break: Option<bool>,
    /// Command to run after each session
    #[arg(long, visible_alias = "cmd", value_name = "COMMAND")]
    pub session_cmd: Option<String>,
    /// Do not send desktop notifications
    #[arg(long, short = 'd')]
    pub disable_notification: bool,
    /// Forbid pausing and resuming work sessions
    #[arg(long)]
    pub strict: bool,
    /// Disable coloured output
    #[arg(long)]
    pub no_color: bool,
    /// Start the first work session in the past (e.g. '20 mins ago', '14:30')
    #[arg(long, value_name = "TIME")]
    pub since: Option<String>,
}

impl TimerArgs {
    fn overrides(&self, clock: &dyn Clock) -> focus_core::Result<TimerOverrides> {
        let duration = |v: &Option<String>| v.as_deref().map(parse_duration).transpose();
        Ok(TimerOverrides {
            work: duration(&self.work)?,
            short_break: duration(&self.short_break)?,
            long_break: duration(&self.long_break)?,
            long_break_interval: self.long_break_interval,
            tags: self.tag.as_deref().map(parse_tags),
            sound: self.sound.clone(),
            work_sound: self.work_sound.clone(),
            break_sound: self.break_sound.clone(),
            sound_on_break: self.sound_on_break,
            session_cmd: self.session_cmd.clone(),
            disable_notification: self.disable_notification,
            strict: self.strict,
            since: self
                .since
                .as_deref()
                .map(|s| parse_since(s, clock.now()))
                .transpose()?,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct ResumeArgs {
    #[command(flatten)]
    pub timer: TimerArgs,
    /// Pick which suspended timer to resume
    #[arg(long)]
    pub select: bool,
    /// Discard the suspended progress and start over at cycle 1
    #[arg(long)]
    pub reset: bool,
}

/// Start a new timer.
pub fn run(paths: &Paths, args: TimerArgs) -> CmdResult {
    let clock = SystemClock::new();
    let cfg = Config::load(paths)?;
    let opts = TimerOptions::from_config(&cfg, &args.overrides(&clock)?)?;

    let mut store = open_store(paths)?;
    if let Some(since) = opts.since {
        check_backfill(&store, since, clock.now())?;
    }
    drive(paths, TimerEngine::new(opts), &mut store, &clock, args.no_color)
}

/// Continue a suspended timer.
pub fn resume(paths: &Paths, args: ResumeArgs) -> CmdResult {
    if args.timer.since.is_some() {
        return Err(CoreError::invalid("--since cannot be used with resume").into());
    }
    let clock = SystemClock::new();
    let mut store = open_store(paths)?;

    let index = if args.select {
        Some(select_timer(&store)?)
    } else {
        None
    };
    let request = ResumeRequest {
        index,
        reset: args.reset,
        overrides: args.timer.overrides(&clock)?,
    };
    let engine = recover(&mut store, &request)?;
    drive(paths, engine, &mut store, &clock, args.timer.no_color)
}

/// Print the suspended timers and read a 1-based choice from stdin.
fn select_timer(store: &SqliteStore) -> Result<usize, Box<dyn std::error::Error>> {
    let entries = suspended_entries(store)?;
    if entries.is_empty() {
        return Err(CoreError::NoSuspendedSession.into());
    }
    super::suspended::print_entries(&entries);

    let answer = prompt_line(&format!("Select a timer [1-{}]: ", entries.len()))?;
    let choice: usize = answer
        .parse()
        .map_err(|_| CoreError::invalid(format!("'{answer}' is not a number")))?;
    if choice == 0 || choice > entries.len() {
        return Err(CoreError::invalid(format!("there is no suspended timer #{choice}")).into());
    }
    Ok(choice - 1)
}

/// SIGINT/SIGTERM become an interrupt event; a second one exits at once.
fn install_signal_handler(tx: Sender<TimerEvent>) -> Result<(), ctrlc::Error> {
    let hits = AtomicUsize::new(0);
    ctrlc::set_handler(move || {
        if hits.fetch_add(1, Ordering::SeqCst) > 0 {
            let _ = crossterm::terminal::disable_raw_mode();
            std::process::exit(1);
        }
        let _ = tx.send(TimerEvent::Interrupt);
    })
}

/// Wire the engine to the terminal, the store and the system and run it to
/// termination.
fn drive(
    paths: &Paths,
    engine: TimerEngine,
    store: &mut SqliteStore,
    clock: &SystemClock,
    no_color: bool,
) -> CmdResult {
    let audio = match AudioPlayer::spawn(paths) {
        Ok(player) => Some(player),
        Err(e) => {
            warn!(error = %e, "sounds disabled");
            None
        }
    };
    let sound: &dyn SoundPlayer = match &audio {
        Some(player) => player,
        None => &Noop,
    };
    let notifier = DesktopNotifier::new(Some(paths.icon()));
    let caps = Capabilities {
        notifier: &notifier,
        sound,
        command: &ShellCommandRunner,
    };

    let (tx, rx) = mpsc::channel();
    install_signal_handler(tx.clone())?;
    spawn_ticker(StdDuration::from_secs(1), tx.clone(), || TimerEvent::Tick)?;

    let overlay = Arc::new(AtomicBool::new(false));
    let sounds = list_sounds(&paths.ambient_sound_dir());
    spawn_key_reader(tx, sounds.clone(), Arc::clone(&overlay))?;

    let mut renderer = TerminalRenderer::new(color_enabled(no_color), sounds, overlay)?;
    let dispatcher = Dispatcher::new(store, caps).with_status_file(paths.status());
    let engine = Runner::new(engine, dispatcher, &mut renderer, clock).run(&rx)?;
    drop(renderer);

    info!(work_cycle = engine.work_cycle(), "timer finished");
    Ok(())
}
