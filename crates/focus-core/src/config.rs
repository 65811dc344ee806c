//! YAML configuration, data-directory layout and effective timer options.
//!
//! The user edits `config.yml`; a timer runs with [`TimerOptions`], which is
//! the config with command-line overrides applied. `TimerOptions` is also
//! what gets frozen into a suspended timer so a resumed run behaves the
//! same way it did before the interruption.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConfigError, CoreError, Result};
use crate::session::SessionName;
use crate::timeutil;

const APP_DIR: &str = "focus";

/// Extensions the audio backend can decode.
pub const SOUND_EXTENSIONS: [&str; 4] = ["mp3", "ogg", "flac", "wav"];

/// Where every file the program touches lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    root: PathBuf,
    env: Option<String>,
}

impl Paths {
    /// `<data_home>/focus`, or `$FOCUS_DATA_DIR` when set. `$FOCUS_ENV`
    /// suffixes the file names.
    pub fn resolve() -> Result<Self> {
        let root = match std::env::var_os("FOCUS_DATA_DIR") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::data_dir()
                .ok_or(ConfigError::NoDataDir)?
                .join(APP_DIR),
        };
        let env = std::env::var("FOCUS_ENV")
            .ok()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        Ok(Self { root, env })
    }

    /// The same layout under an explicit directory.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            env: None,
        }
    }

    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    /// Create the data directory and its sound folders.
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(self.ambient_sound_dir())?;
        std::fs::create_dir_all(self.alert_sound_dir())?;
        Ok(())
    }

    fn file(&self, stem: &str, ext: &str) -> PathBuf {
        match &self.env {
            Some(env) => self.root.join(format!("{stem}_{env}.{ext}")),
            None => self.root.join(format!("{stem}.{ext}")),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn db(&self) -> PathBuf {
        self.file("focus", "db")
    }

    pub fn config(&self) -> PathBuf {
        self.file("config", "yml")
    }

    pub fn status(&self) -> PathBuf {
        self.file("status", "json")
    }

    pub fn log_file_name(&self) -> String {
        match &self.env {
            Some(env) => format!("focus_{env}.log"),
            None => "focus.log".to_string(),
        }
    }

    pub fn ambient_sound_dir(&self) -> PathBuf {
        self.root.join("ambient_sound")
    }

    pub fn alert_sound_dir(&self) -> PathBuf {
        self.root.join("alert_sound")
    }

    pub fn icon(&self) -> PathBuf {
        self.root.join("static").join("icon.png")
    }
}

/// One of the three session kinds as configured by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "Duration::zero", with = "timeutil::literal")]
    pub duration: Duration,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub color: String,
    /// Alert played when this session is about to start. Empty disables it.
    #[serde(default)]
    pub sound: String,
}

impl SessionConfig {
    fn new(minutes: i64, message: &str, color: &str) -> Self {
        Self {
            duration: Duration::minutes(minutes),
            message: message.to_string(),
            color: color.to_string(),
            sound: String::new(),
        }
    }

    pub fn default_for(name: SessionName) -> Self {
        match name {
            SessionName::Work => Self::new(25, "Focus on your task", "#B0DB43"),
            SessionName::ShortBreak => Self::new(5, "Take a breather", "#12EAEA"),
            SessionName::LongBreak => Self::new(15, "Take a long break", "#C492B1"),
        }
    }

    /// Fill fields the file left out.
    fn fill_from(&mut self, defaults: Self) {
        if self.duration.is_zero() {
            self.duration = defaults.duration;
        }
        if self.message.trim().is_empty() {
            self.message = defaults.message;
        }
        if self.color.is_empty() {
            self.color = defaults.color;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsConfig {
    #[serde(default = "default_long_break_interval")]
    pub long_break_interval: u32,
    #[serde(default)]
    pub auto_start_work: bool,
    #[serde(default = "default_true")]
    pub auto_start_break: bool,
    #[serde(default)]
    pub sound_on_break: bool,
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub ambient_sound: String,
    #[serde(default)]
    pub cmd: String,
    #[serde(default, rename = "24hr_clock")]
    pub twenty_four_hour_clock: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub dark_theme: bool,
}

/// Contents of `config.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_work")]
    pub work: SessionConfig,
    #[serde(default = "default_short_break")]
    pub short_break: SessionConfig,
    #[serde(default = "default_long_break")]
    pub long_break: SessionConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

fn default_true() -> bool {
    true
}
fn default_long_break_interval() -> u32 {
    4
}
fn default_work() -> SessionConfig {
    SessionConfig::default_for(SessionName::Work)
}
fn default_short_break() -> SessionConfig {
    SessionConfig::default_for(SessionName::ShortBreak)
}
fn default_long_break() -> SessionConfig {
    SessionConfig::default_for(SessionName::LongBreak)
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            long_break_interval: default_long_break_interval(),
            auto_start_work: false,
            auto_start_break: true,
            sound_on_break: false,
            strict: false,
            ambient_sound: String::new(),
            cmd: String::new(),
            twenty_four_hour_clock: false,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { dark_theme: true }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work: default_work(),
            short_break: default_short_break(),
            long_break: default_long_break(),
            settings: SettingsConfig::default(),
            notifications: NotificationsConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl Config {
    /// Load from `paths.config()`, writing the defaults first if the file
    /// does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or written, does not
    /// parse, or fails validation.
    pub fn load(paths: &Paths) -> Result<Self> {
        let path = paths.config();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save(paths)?;
                info!(path = %path.display(), "wrote default configuration");
                return Ok(cfg);
            }
            Err(e) => {
                return Err(ConfigError::LoadFailed {
                    path,
                    message: e.to_string(),
                }
                .into())
            }
        };

        let cfg = Self::from_yaml(&content).map_err(|e| match e {
            CoreError::Yaml(err) => CoreError::Config(ConfigError::LoadFailed {
                path: path.clone(),
                message: err.to_string(),
            }),
            other => other,
        })?;
        Ok(cfg)
    }

    /// Parse, fill in missing values and validate.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut cfg: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(content)?
        };
        cfg.work.fill_from(default_work());
        cfg.short_break.fill_from(default_short_break());
        cfg.long_break.fill_from(default_long_break());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Persist to disk.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self, paths: &Paths) -> Result<()> {
        let path = paths.config();
        let content = serde_yaml::to_string(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    pub fn session(&self, name: SessionName) -> &SessionConfig {
        match name {
            SessionName::Work => &self.work,
            SessionName::ShortBreak => &self.short_break,
            SessionName::LongBreak => &self.long_break,
        }
    }

    /// Check ranges and cross-field relationships.
    pub fn validate(&self) -> Result<()> {
        for (key, sc) in [
            ("work", &self.work),
            ("short_break", &self.short_break),
            ("long_break", &self.long_break),
        ] {
            validate_duration(key, sc.duration)?;
            if sc.message.trim().is_empty() {
                return Err(invalid_value(key, "message cannot be empty"));
            }
            if !is_hex_color(&sc.color) {
                return Err(invalid_value(
                    key,
                    format!("color must be a hex color code such as #FF0000, got {}", sc.color),
                ));
            }
            if !sc.sound.is_empty() {
                validate_sound(&sc.sound)?;
            }
        }

        if self.short_break.duration >= self.work.duration {
            return Err(invalid_value(
                "short_break",
                format!(
                    "duration ({}) must be less than the work duration ({})",
                    timeutil::format_duration(self.short_break.duration),
                    timeutil::format_duration(self.work.duration)
                ),
            ));
        }
        if self.long_break.duration < self.short_break.duration {
            return Err(invalid_value(
                "long_break",
                format!(
                    "duration ({}) must not be shorter than the short break ({})",
                    timeutil::format_duration(self.long_break.duration),
                    timeutil::format_duration(self.short_break.duration)
                ),
            ));
        }

        validate_interval(self.settings.long_break_interval)?;
        if !self.settings.ambient_sound.is_empty() {
            validate_sound(&self.settings.ambient_sound)?;
        }
        Ok(())
    }
}

fn invalid_value(key: &str, message: impl Into<String>) -> CoreError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
    .into()
}

fn validate_duration(key: &str, d: Duration) -> Result<()> {
    if d < Duration::seconds(1) || d > Duration::hours(12) {
        return Err(invalid_value(key, "duration must be between 1s and 12h"));
    }
    Ok(())
}

fn validate_interval(interval: u32) -> Result<()> {
    if !(4..=10).contains(&interval) {
        return Err(CoreError::invalid(format!(
            "long break interval must be between 4 and 10 sessions, got {interval}"
        )));
    }
    Ok(())
}

fn is_hex_color(s: &str) -> bool {
    s.len() == 7
        && s.starts_with('#')
        && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Normalise a sound name to a file name (bare names mean `.ogg`) and check
/// its extension.
pub fn validate_sound(name: &str) -> Result<String> {
    let file = if Path::new(name).extension().is_none() {
        format!("{name}.ogg")
    } else {
        name.to_string()
    };
    let ext = Path::new(&file)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !SOUND_EXTENSIONS.contains(&ext.as_str()) {
        return Err(CoreError::InvalidSoundFormat(file));
    }
    Ok(file)
}

/// The configuration a timer actually runs with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerOptions {
    pub work: SessionConfig,
    pub short_break: SessionConfig,
    pub long_break: SessionConfig,
    pub long_break_interval: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ambient_sound: String,
    #[serde(default)]
    pub sound_on_break: bool,
    #[serde(default)]
    pub auto_start_work: bool,
    #[serde(default)]
    pub auto_start_break: bool,
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub notifications: bool,
    #[serde(default)]
    pub session_cmd: String,
    #[serde(default)]
    pub twenty_four_hour_clock: bool,
    /// Backfill start for the first work session. Never persisted.
    #[serde(skip)]
    pub since: Option<DateTime<Local>>,
}

/// Values given on the command line. `None` leaves the config value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerOverrides {
    pub work: Option<Duration>,
    pub short_break: Option<Duration>,
    pub long_break: Option<Duration>,
    pub long_break_interval: Option<u32>,
    pub tags: Option<Vec<String>>,
    pub sound: Option<String>,
    pub work_sound: Option<String>,
    pub break_sound: Option<String>,
    pub sound_on_break: Option<bool>,
    pub session_cmd: Option<String>,
    pub disable_notification: bool,
    pub strict: bool,
    pub since: Option<DateTime<Local>>,
}

fn sound_flag(value: &str) -> Result<String> {
    if value == "off" {
        Ok(String::new())
    } else {
        validate_sound(value)?;
        Ok(value.to_string())
    }
}

impl TimerOptions {
    /// Build from the config file and the command line.
    pub fn from_config(cfg: &Config, overrides: &TimerOverrides) -> Result<Self> {
        let mut opts = Self {
            work: cfg.work.clone(),
            short_break: cfg.short_break.clone(),
            long_break: cfg.long_break.clone(),
            long_break_interval: cfg.settings.long_break_interval,
            tags: Vec::new(),
            ambient_sound: cfg.settings.ambient_sound.clone(),
            sound_on_break: cfg.settings.sound_on_break,
            auto_start_work: cfg.settings.auto_start_work,
            auto_start_break: cfg.settings.auto_start_break,
            strict: cfg.settings.strict,
            notifications: cfg.notifications.enabled,
            session_cmd: cfg.settings.cmd.clone(),
            twenty_four_hour_clock: cfg.settings.twenty_four_hour_clock,
            since: None,
        };

        if let Some(d) = overrides.work {
            opts.work.duration = d;
        }
        if let Some(d) = overrides.short_break {
            opts.short_break.duration = d;
        }
        if let Some(d) = overrides.long_break {
            opts.long_break.duration = d;
        }
        for (key, d) in [
            ("work", opts.work.duration),
            ("short_break", opts.short_break.duration),
            ("long_break", opts.long_break.duration),
        ] {
            validate_duration(key, d).map_err(|e| CoreError::invalid(e.to_string()))?;
        }
        if let Some(interval) = overrides.long_break_interval {
            validate_interval(interval)?;
            opts.long_break_interval = interval;
        }
        if let Some(tags) = &overrides.tags {
            opts.tags = tags.clone();
        }
        if overrides.strict {
            opts.strict = true;
        }
        opts.since = overrides.since;
        opts.apply_resume_overrides(overrides)?;
        Ok(opts)
    }

    /// Overrides honoured on `resume`: sounds, the session command and
    /// notifications. Durations and tags stay as they were suspended.
    pub fn apply_resume_overrides(&mut self, overrides: &TimerOverrides) -> Result<()> {
        if let Some(sound) = &overrides.sound {
            self.ambient_sound = sound_flag(sound)?;
        }
        if let Some(sound) = &overrides.work_sound {
            self.work.sound = sound_flag(sound)?;
        }
        if let Some(sound) = &overrides.break_sound {
            let sound = sound_flag(sound)?;
            self.short_break.sound = sound.clone();
            self.long_break.sound = sound;
        }
        if let Some(on) = overrides.sound_on_break {
            self.sound_on_break = on;
        }
        if let Some(cmd) = &overrides.session_cmd {
            self.session_cmd = cmd.clone();
        }
        if overrides.disable_notification {
            self.notifications = false;
        }
        Ok(())
    }

    pub fn session(&self, name: SessionName) -> &SessionConfig {
        match name {
            SessionName::Work => &self.work,
            SessionName::ShortBreak => &self.short_break,
            SessionName::LongBreak => &self.long_break,
        }
    }

    pub fn duration(&self, name: SessionName) -> Duration {
        self.session(name).duration
    }
}
