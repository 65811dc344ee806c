//! Database schema migrations for focus.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Local};
use rusqlite::{params, Connection, Transaction};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{DatabaseError, Result};
use crate::timer::SuspendedTimer;
use crate::timeutil;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Any stored duration below this is a legacy minute count.
const LEGACY_DURATION_CEILING: i64 = 1_000_000_000;
const NANOS_PER_MINUTE: i64 = 60_000_000_000;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails; the failing step is rolled back.
pub fn migrate(conn: &Connection) -> Result<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn).map_err(|e| DatabaseError::MigrationFailed(format!("v1: {e}")))?;
    }
    if current_version < 2 {
        migrate_v2(conn).map_err(|e| DatabaseError::MigrationFailed(format!("v2: {e}")))?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )?;
    Ok(())
}

/// Returns 0 for a fresh database.
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    match conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    }) {
        Ok(v) => Ok(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

fn set_schema_version(tx: &Transaction<'_>, version: i32) -> rusqlite::Result<()> {
    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration v1: the two key-value tables.
fn migrate_v1(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        ) WITHOUT ROWID;

        CREATE TABLE IF NOT EXISTS timers (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        ) WITHOUT ROWID;",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// Migration v2: bring records written by older releases into the current
/// format.
///
/// - sessions are re-keyed to canonical UTC nanosecond keys
/// - minute-valued durations become nanoseconds
/// - a missing timeline becomes a single `(start_time, end_time)` segment
/// - suspended timers that no longer decode, or whose session cannot be
///   found under its canonical key, are dropped
///
/// Everything happens in one transaction.
fn migrate_v2(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    let sessions = read_all(&tx, "sessions")?;
    let mut rekeyed: BTreeMap<String, (String, Value)> = BTreeMap::new();
    for (old_key, raw) in sessions {
        let mut value: Value = serde_json::from_str(&raw)?;
        let key = upgrade_session(&mut value)
            .ok_or_else(|| DatabaseError::MigrationFailed(format!("session {old_key} has no start_time")))?;
        match rekeyed.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert((old_key, value));
            }
            // Two legacy keys for the same instant are copies of one session.
            Entry::Occupied(mut slot) => {
                let (kept_key, kept) = slot.get();
                let newer = parse_time(&value["end_time"]) > parse_time(&kept["end_time"]);
                let keeping = if newer { &old_key } else { kept_key };
                warn!(
                    key = %slot.key(),
                    first = %kept_key,
                    second = %old_key,
                    %keeping,
                    "legacy sessions share a start time"
                );
                if newer {
                    slot.insert((old_key, value));
                }
            }
        }
    }
    let known_keys: HashSet<String> = rekeyed.keys().cloned().collect();

    tx.execute("DELETE FROM sessions", [])?;
    for (key, (_, value)) in &rekeyed {
        tx.execute(
            "INSERT INTO sessions (key, value) VALUES (?1, ?2)",
            params![key, serde_json::to_string(value)?],
        )?;
    }

    let timers = read_all(&tx, "timers")?;
    tx.execute("DELETE FROM timers", [])?;
    let mut dropped = 0usize;
    for (old_key, raw) in timers {
        match upgrade_timer(&raw, &known_keys) {
            Some(timer) => {
                tx.execute(
                    "INSERT OR REPLACE INTO timers (key, value) VALUES (?1, ?2)",
                    params![timer.key(), serde_json::to_string(&timer)?],
                )?;
            }
            None => {
                warn!(key = %old_key, "discarding suspended timer that cannot be migrated");
                dropped += 1;
            }
        }
    }

    set_schema_version(&tx, 2)?;
    tx.commit()?;

    if !rekeyed.is_empty() || dropped > 0 {
        info!(sessions = rekeyed.len(), dropped_timers = dropped, "migrated legacy records");
    }
    Ok(())
}

fn read_all(tx: &Transaction<'_>, table: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = tx.prepare(&format!("SELECT key, value FROM {table} ORDER BY key"))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn parse_time(v: &Value) -> Option<DateTime<Local>> {
    v.as_str().and_then(|s| timeutil::parse_key(s).ok())
}

fn canonical(v: &Value) -> Option<Value> {
    parse_time(v).map(|t| Value::String(t.to_rfc3339_opts(chrono::SecondsFormat::Nanos, false)))
}

/// Rewrite one legacy session in place. Returns its canonical key.
fn upgrade_session(value: &mut Value) -> Option<String> {
    let obj = value.as_object_mut()?;
    let start = parse_time(obj.get("start_time")?)?;

    if let Some(d) = obj.get("duration").and_then(Value::as_i64) {
        if d < LEGACY_DURATION_CEILING {
            obj.insert("duration".into(), Value::from(d * NANOS_PER_MINUTE));
        }
    }

    let end = obj.get("end_time").cloned().unwrap_or_else(|| obj["start_time"].clone());
    let needs_timeline = obj
        .get("timeline")
        .and_then(Value::as_array)
        .map_or(true, |t| t.is_empty());
    if needs_timeline {
        let segment = serde_json::json!({ "start_time": obj["start_time"], "end_time": end });
        obj.insert("timeline".into(), Value::Array(vec![segment]));
    }
    obj.entry("end_time").or_insert(end);
    obj.entry("tags").or_insert(Value::Array(vec![]));
    obj.entry("completed").or_insert(Value::Bool(false));

    for field in ["start_time", "end_time"] {
        if let Some(fixed) = obj.get(field).and_then(canonical) {
            obj.insert(field.into(), fixed);
        }
    }

    Some(timeutil::to_key(&start))
}

fn upgrade_timer(raw: &str, known_keys: &HashSet<String>) -> Option<SuspendedTimer> {
    let mut value: Value = serde_json::from_str(raw).ok()?;
    let obj = value.as_object_mut()?;
    let key = match obj.get("session_key").and_then(Value::as_str) {
        Some("") | None => String::new(),
        Some(old) => {
            let key = timeutil::to_key(&timeutil::parse_key(old).ok()?);
            if !known_keys.contains(&key) {
                return None;
            }
            key
        }
    };
    obj.insert("session_key".into(), Value::String(key));
    serde_json::from_value(value).ok()
}
