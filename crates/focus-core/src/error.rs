//! Core error types for focus-core.
//!
//! Every failure the timer, the store and the aggregator can surface is a
//! variant of [`CoreError`]. Advisory subsystems (audio, notifications) have
//! variants too, but callers only ever log them.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for focus-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Another process holds the store lock.
    #[error("is Focus already running? Only one instance can be active at a time")]
    AlreadyRunning,

    /// `resume` was requested but no timer was suspended.
    #[error("no paused timers were found")]
    NoSuspendedSession,

    /// Strict mode forbids picking up an interrupted work session.
    #[error("session resumption failed: strict mode is enabled")]
    StrictModeRefusal,

    /// Bad duration, date, period, index or similar user input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A backfilled session would overlap a stored one.
    #[error("new sessions cannot overlap with existing ones (overlaps session started at {0})")]
    SessionOverlap(String),

    /// Unsupported audio file extension.
    #[error("invalid sound file format: {0} (must be mp3, ogg, flac, or wav)")]
    InvalidSoundFormat(String),

    /// The post-session command could not be parsed, spawned, or exited non-zero.
    #[error("session command `{command}` failed: {message}")]
    CommandFailed { command: String, message: String },

    /// Audio playback failed. Never fatal.
    #[error("audio playback failed: {0}")]
    AudioFailure(String),

    /// Desktop notification failed. Never fatal.
    #[error("notification failed: {0}")]
    NotifyFailure(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML config errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CoreError {
    /// Shorthand for [`CoreError::InvalidInput`].
    pub fn invalid(message: impl Into<String>) -> Self {
        CoreError::InvalidInput(message.into())
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// The store was used after `close()`.
    #[error("Database is closed")]
    Closed,

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// The data directory could not be determined.
    #[error("Unable to determine the data directory")]
    NoDataDir,
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
