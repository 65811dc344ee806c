//! CLI tests against the built `focus` binary.
//!
//! Every test gets its own data directory through `FOCUS_DATA_DIR`.

use std::path::Path;
use std::process::{Command, Output};

use chrono::{Duration, Local, TimeZone};
use focus_core::storage::SessionStore;
use focus_core::{Paths, Session, SessionName, SqliteStore};
use tempfile::TempDir;

/// Run the binary and return (stdout, stderr, exit code).
fn run_cli(data: &Path, args: &[&str]) -> (String, String, i32) {
    let output: Output = Command::new(env!("CARGO_BIN_EXE_focus"))
        .args(args)
        .env("FOCUS_DATA_DIR", data)
        .env_remove("FOCUS_ENV")
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to run focus");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

fn run_cli_success(data: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(data, args);
    assert_eq!(code, 0, "focus {args:?} failed: {stderr}");
    stdout
}

fn run_cli_failure(data: &Path, args: &[&str]) -> String {
    let (_, stderr, code) = run_cli(data, args);
    assert_eq!(code, 1, "focus {args:?} unexpectedly exited with {code}");
    assert!(stderr.starts_with("error: "), "stderr was: {stderr}");
    stderr
}

/// Two finished work sessions and one abandoned one on 2024-03-04.
fn seed(data: &Path) {
    let mut store = SqliteStore::open(&Paths::at(data).db()).unwrap();
    for (h, mins, done, tags) in [
        (9, 25, true, vec!["code".to_string()]),
        (10, 25, true, vec!["code".to_string(), "review".to_string()]),
        (11, 10, false, vec![]),
    ] {
        let start = Local.with_ymd_and_hms(2024, 3, 4, h, 0, 0).unwrap();
        let mut s = Session::new(SessionName::Work, Duration::minutes(25), tags, start);
        s.advance(start + Duration::minutes(mins));
        if done {
            s.complete();
        }
        store.put_session(&s).unwrap();
    }
}

const RANGE: [&str; 4] = ["--start", "2024-03-01", "--end", "2024-03-10"];

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    let out = run_cli_success(dir.path(), &["--help"]);
    let subcommands = [
        "resume",
        "stats",
        "list",
        "edit-tag",
        "delete",
        "edit-config",
        "status",
        "delete-timer",
    ];
    for sub in subcommands {
        assert!(out.contains(sub), "help is missing {sub}");
    }
}

#[test]
fn test_stats_json_on_empty_store() {
    let dir = TempDir::new().unwrap();
    let out = run_cli_success(dir.path(), &["stats", "--json", "--period", "today"]);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["totals"]["completed"], 0);
    assert_eq!(json["totals"]["duration"], 0);
    assert_eq!(json["hourly"].as_array().unwrap().len(), 24);
    assert_eq!(json["weekday"].as_array().unwrap().len(), 7);
}

#[test]
fn test_stats_json_counts_seeded_sessions() {
    let dir = TempDir::new().unwrap();
    seed(dir.path());
    let mut args = vec!["stats", "--json"];
    args.extend(RANGE);
    let json: serde_json::Value =
        serde_json::from_str(&run_cli_success(dir.path(), &args)).unwrap();

    assert_eq!(json["totals"]["completed"], 2);
    assert_eq!(json["totals"]["abandoned"], 1);
    let total = Duration::minutes(60).num_nanoseconds().unwrap();
    assert_eq!(json["totals"]["duration"], total);
    assert_eq!(json["tags"][0]["name"], "code");
    assert_eq!(
        json["tags"][0]["duration"],
        Duration::minutes(50).num_nanoseconds().unwrap()
    );
}

#[test]
fn test_stats_filters_by_tag() {
    let dir = TempDir::new().unwrap();
    seed(dir.path());
    let mut args = vec!["stats", "--json", "--tag", "review"];
    args.extend(RANGE);
    let json: serde_json::Value =
        serde_json::from_str(&run_cli_success(dir.path(), &args)).unwrap();
    assert_eq!(json["totals"]["completed"], 1);
}

#[test]
fn test_stats_text_report() {
    let dir = TempDir::new().unwrap();
    seed(dir.path());
    let mut args = vec!["stats"];
    args.extend(RANGE);
    let out = run_cli_success(dir.path(), &args);
    assert!(out.contains("2 completed, 1 abandoned"), "{out}");
}

#[test]
fn test_bad_period_and_reversed_range_fail() {
    let dir = TempDir::new().unwrap();
    let err = run_cli_failure(dir.path(), &["stats", "--period", "fortnight"]);
    assert!(err.contains("invalid input"), "{err}");
    run_cli_failure(
        dir.path(),
        &["list", "--start", "2024-03-10", "--end", "2024-03-01"],
    );
}

#[test]
fn test_end_without_start_is_refused() {
    let dir = TempDir::new().unwrap();
    seed(dir.path());
    let err = run_cli_failure(dir.path(), &["delete", "--yes", "--end", "2024-03-10"]);
    assert!(err.contains("--end needs a --start"), "{err}");

    let mut args = vec!["list", "--json"];
    args.extend(RANGE);
    let json: serde_json::Value =
        serde_json::from_str(&run_cli_success(dir.path(), &args)).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 3);
}

#[test]
fn test_list_json_and_table() {
    let dir = TempDir::new().unwrap();
    seed(dir.path());

    let mut args = vec!["list", "--json"];
    args.extend(RANGE);
    let json: serde_json::Value =
        serde_json::from_str(&run_cli_success(dir.path(), &args)).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 3);

    let mut args = vec!["list"];
    args.extend(RANGE);
    let out = run_cli_success(dir.path(), &args);
    assert!(out.contains("abandoned"));
    assert!(out.contains("code · review"));

    let out = run_cli_success(dir.path(), &["list", "--period", "today"]);
    assert!(out.contains("No sessions found"));
}

#[test]
fn test_edit_tag_and_delete() {
    let dir = TempDir::new().unwrap();
    seed(dir.path());

    run_cli_success(
        dir.path(),
        &[
            "edit-tag",
            "--yes",
            "--start",
            "2024-03-04 09:30",
            "--end",
            "2024-03-04 10:30",
            "writing",
        ],
    );

    let mut args = vec!["list", "--json", "--tag", "writing"];
    args.extend(RANGE);
    let json: serde_json::Value =
        serde_json::from_str(&run_cli_success(dir.path(), &args)).unwrap();
    // The 09:00 session ends at 09:25, so only the 10:00 one is retagged.
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["tags"][0], "writing");

    let mut args = vec!["delete", "--yes"];
    args.extend(RANGE);
    run_cli_success(dir.path(), &args);

    let mut args = vec!["list", "--json"];
    args.extend(RANGE);
    let json: serde_json::Value =
        serde_json::from_str(&run_cli_success(dir.path(), &args)).unwrap();
    assert!(json.as_array().unwrap().is_empty());
}

#[test]
fn test_resume_without_suspended_timer_fails() {
    let dir = TempDir::new().unwrap();
    let err = run_cli_failure(dir.path(), &["resume"]);
    assert!(err.contains("no paused timers"), "{err}");
    run_cli_failure(dir.path(), &["delete-timer", "--all"]);
}

#[test]
fn test_status_is_silent_when_idle() {
    let dir = TempDir::new().unwrap();
    let out = run_cli_success(dir.path(), &["status"]);
    assert!(out.is_empty());
}

#[test]
fn test_invalid_timer_flags_fail_before_starting() {
    let dir = TempDir::new().unwrap();
    let err = run_cli_failure(dir.path(), &["--work", "0"]);
    assert!(err.contains("greater than zero"), "{err}");
    let err = run_cli_failure(dir.path(), &["--long-break-interval", "2"]);
    assert!(err.contains("between 4 and 10"), "{err}");
    let err = run_cli_failure(dir.path(), &["--sound", "rain.txt"]);
    assert!(err.contains("invalid sound file format"), "{err}");
}

#[test]
fn test_backfill_refuses_overlap() {
    let dir = TempDir::new().unwrap();
    let now = Local::now();
    let start = now - Duration::minutes(40);
    {
        let mut store = SqliteStore::open(&Paths::at(dir.path()).db()).unwrap();
        let mut s = Session::new(SessionName::Work, Duration::minutes(25), vec![], start);
        s.advance(start + Duration::minutes(25));
        s.complete();
        store.put_session(&s).unwrap();
    }
    let err = run_cli_failure(dir.path(), &["--since", "30 mins ago"]);
    assert!(err.contains("cannot overlap"), "{err}");
}

#[test]
fn test_config_is_written_on_first_use() {
    let dir = TempDir::new().unwrap();
    run_cli_failure(dir.path(), &["--work", "0"]);
    let cfg = std::fs::read_to_string(dir.path().join("config.yml")).unwrap();
    assert!(cfg.contains("long_break_interval"));
}
