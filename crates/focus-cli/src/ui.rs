//! Terminal drawing and keyboard input for the running timer.

use std::io::{self, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Local};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor, Stylize};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType};
use crossterm::{cursor, execute, queue};
use focus_core::integrations::Renderer;
use focus_core::timeutil::format_clock;
use focus_core::{CoreError, SessionName, TimerEvent, TimerState, TimerView};
use tracing::warn;

const BAR_WIDTH: usize = 40;

/// Whether ANSI colour may be used.
pub fn color_enabled(no_color_flag: bool) -> bool {
    !no_color_flag
        && std::env::var_os("NO_COLOR").is_none()
        && std::env::var_os("FOCUS_NO_COLOR").is_none()
}

/// `#RRGGBB` to a terminal colour.
fn hex_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(Color::Rgb {
        r: channel(0)?,
        g: channel(2)?,
        b: channel(4)?,
    })
}

fn clock_time(t: DateTime<Local>, twenty_four_hour: bool) -> String {
    if twenty_four_hour {
        t.format("%H:%M").to_string()
    } else {
        t.format("%I:%M %p").to_string()
    }
}

fn progress_bar(view: &TimerView) -> String {
    let total = view.duration.num_milliseconds().max(1) as f64;
    let done = (view.duration - view.remaining).num_milliseconds().max(0) as f64;
    let filled = ((done / total) * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

fn title(view: &TimerView) -> String {
    match view.name {
        SessionName::Work => format!(
            "{} {}/{}",
            view.name.label(),
            view.work_cycle,
            view.long_break_interval
        ),
        _ => view.name.label().to_string(),
    }
}

/// Full-screen countdown drawn with crossterm.
///
/// Holds the terminal in raw mode for its lifetime.
pub struct TerminalRenderer {
    out: Stdout,
    color: bool,
    sounds: Vec<String>,
    overlay: Arc<AtomicBool>,
    last_error: Option<String>,
}

impl TerminalRenderer {
    pub fn new(color: bool, sounds: Vec<String>, overlay: Arc<AtomicBool>) -> io::Result<Self> {
        enable_raw_mode()?;
        let mut out = io::stdout();
        execute!(out, cursor::Hide)?;
        Ok(Self {
            out,
            color,
            sounds,
            overlay,
            last_error: None,
        })
    }

    fn line(&mut self, text: &str, color: Option<Color>) -> io::Result<()> {
        match color.filter(|_| self.color) {
            Some(c) => queue!(self.out, SetForegroundColor(c), Print(text), ResetColor)?,
            None => queue!(self.out, Print(text))?,
        }
        queue!(self.out, cursor::MoveToNextLine(1))
    }

    fn draw(&mut self, view: &TimerView) -> io::Result<()> {
        let accent = hex_color(&view.color);
        queue!(self.out, cursor::MoveTo(0, 0), Clear(ClearType::All))?;

        self.line(&title(view), accent)?;
        self.line(&view.message, None)?;
        self.line("", None)?;

        let countdown = format!(
            "{}  {}",
            format_clock(view.remaining),
            progress_bar(view)
        );
        self.line(&countdown, accent)?;

        if view.underlying == TimerState::Running {
            let until = format!(
                "until {}",
                clock_time(view.end_time, view.twenty_four_hour_clock)
            );
            self.line(&until, None)?;
        }
        if !view.tags.is_empty() {
            self.line(&format!("tags: {}", view.tags.join(", ")), None)?;
        }
        if !view.ambient_sound.is_empty() {
            self.line(&format!("sound: {}", view.ambient_sound), None)?;
        }
        self.line("", None)?;

        match view.state {
            TimerState::SettingsOverlay => {
                self.line("Ambient sound:", accent)?;
                self.line("  0  off", None)?;
                let sounds = self.sounds.clone();
                for (i, name) in sounds.iter().enumerate().take(9) {
                    self.line(&format!("  {}  {name}", i + 1), None)?;
                }
                self.line("[0-9] choose  [esc] close", None)?;
            }
            TimerState::Paused => {
                self.line("Paused", Some(Color::Yellow))?;
                self.line("[p] resume  [s] sounds  [q] quit", None)?;
            }
            TimerState::AwaitingUserContinue => {
                let next = view.next.map(|n| n.label()).unwrap_or("Next session");
                self.line(&format!("{next} is next. Press Enter to continue"), None)?;
                self.line("[enter] continue  [s] sounds  [q] quit", None)?;
            }
            TimerState::Running => {
                let mut keys = Vec::new();
                if view.name.is_work() && !view.strict {
                    keys.push("[p] pause");
                }
                if !view.name.is_work() {
                    keys.push("[esc] skip break");
                }
                keys.extend(["[s] sounds", "[q] quit"]);
                self.line(&keys.join("  "), None)?;
            }
            TimerState::Idle | TimerState::Terminated => {}
        }

        if let Some(err) = self.last_error.clone() {
            self.line("", None)?;
            if self.color {
                queue!(self.out, Print(format!("error: {err}").red()))?;
            } else {
                queue!(self.out, Print(format!("error: {err}")))?;
            }
        }
        self.out.flush()
    }

    /// Map a key press to an engine event.
    fn key_event(key: KeyEvent, overlay: bool, sounds: &[String]) -> Option<TimerEvent> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(TimerEvent::Interrupt)
            }
            KeyCode::Enter => Some(TimerEvent::UserEnter),
            KeyCode::Char('p') if !overlay => Some(TimerEvent::TogglePause),
            KeyCode::Char('s') if !overlay => Some(TimerEvent::OpenSettings),
            KeyCode::Char('q') => Some(TimerEvent::Quit),
            KeyCode::Esc if overlay => Some(TimerEvent::CloseSettings),
            KeyCode::Esc => Some(TimerEvent::SkipBreak),
            KeyCode::Char('0') if overlay => Some(TimerEvent::SelectSound(String::new())),
            KeyCode::Char(c @ '1'..='9') if overlay => {
                let index = c.to_digit(10)? as usize - 1;
                sounds.get(index).cloned().map(TimerEvent::SelectSound)
            }
            _ => None,
        }
    }
}

impl Renderer for TerminalRenderer {
    fn render(&mut self, view: &TimerView) {
        self.overlay
            .store(view.state == TimerState::SettingsOverlay, Ordering::SeqCst);
        if view.state == TimerState::Terminated {
            return;
        }
        if let Err(e) = self.draw(view) {
            warn!(error = %e, "failed to draw timer");
        }
    }

    fn report(&mut self, err: &CoreError) {
        warn!(error = %err, "timer error");
        self.last_error = Some(err.to_string());
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        let _ = execute!(self.out, cursor::Show, Print("\r\n"));
        let _ = disable_raw_mode();
    }
}

/// Read keys on a background thread and forward them as timer events.
///
/// The thread stops once the receiver is gone.
pub fn spawn_key_reader(
    tx: Sender<TimerEvent>,
    sounds: Vec<String>,
    overlay: Arc<AtomicBool>,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("focus-keys".to_string())
        .spawn(move || loop {
            match event::poll(StdDuration::from_millis(200)) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(error = %e, "keyboard polling failed");
                    break;
                }
            }
            let key = match event::read() {
                Ok(Event::Key(key)) => key,
                Ok(Event::Resize(..)) => {
                    if tx.send(TimerEvent::Tick).is_err() {
                        break;
                    }
                    continue;
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!(error = %e, "keyboard read failed");
                    break;
                }
            };
            let overlay_open = overlay.load(Ordering::SeqCst);
            if let Some(ev) = TerminalRenderer::key_event(key, overlay_open, &sounds) {
                if tx.send(ev).is_err() {
                    break;
                }
            }
        })
}
