//! Both store backends answer the same queries the same way.

use chrono::{DateTime, Duration, Local, TimeZone};
use focus_core::error::{CoreError, DatabaseError};
use focus_core::storage::{probe_running, SessionStore};
use focus_core::{MemoryStore, Session, SessionName, SqliteStore};
use tempfile::TempDir;

fn at(day: u32, h: u32, m: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 3, day, h, m, 0).unwrap()
}

fn finished(start: DateTime<Local>, mins: i64, tags: &[&str]) -> Session {
    let mut s = Session::new(
        SessionName::Work,
        Duration::minutes(mins),
        tags.iter().map(|t| t.to_string()).collect(),
        start,
    );
    s.advance(start + Duration::minutes(mins));
    s.complete();
    s
}

fn fill(store: &mut dyn SessionStore) {
    store.put_session(&finished(at(3, 23, 50), 25, &["night"])).unwrap();
    store.put_session(&finished(at(4, 9, 0), 25, &["code"])).unwrap();
    store.put_session(&finished(at(4, 14, 0), 50, &["code", "review"])).unwrap();
    store.put_session(&finished(at(5, 9, 0), 25, &[])).unwrap();
}

fn keys(sessions: &[Session]) -> Vec<String> {
    sessions.iter().map(Session::key).collect()
}

#[test]
fn test_backends_agree_on_range_queries() {
    let dir = TempDir::new().unwrap();
    let mut sqlite = SqliteStore::open(&dir.path().join("focus.db")).unwrap();
    let mut memory = MemoryStore::new();
    fill(&mut sqlite);
    fill(&mut memory);

    let code = vec!["code".to_string()];
    let queries: [(DateTime<Local>, DateTime<Local>, &[String]); 4] = [
        (at(4, 0, 0), at(4, 23, 59), &[]),
        (at(4, 0, 0), at(5, 23, 59), &code),
        (at(1, 0, 0), at(9, 0, 0), &[]),
        (at(4, 10, 0), at(4, 13, 0), &[]),
    ];
    for (from, to, tags) in queries {
        let a = sqlite.get_sessions_in_range(from, to, tags).unwrap();
        let b = memory.get_sessions_in_range(from, to, tags).unwrap();
        assert_eq!(keys(&a), keys(&b), "range {from} .. {to} tags {tags:?}");
    }

    // The session that started before midnight still belongs to the 4th.
    let day = sqlite
        .get_sessions_in_range(at(4, 0, 0), at(4, 23, 59), &[])
        .unwrap();
    assert_eq!(day.len(), 3);
    assert_eq!(day[0].start_time, at(3, 23, 50));
}

#[test]
fn test_sessions_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("focus.db");
    let session = finished(at(4, 9, 0), 25, &["code"]);
    {
        let mut store = SqliteStore::open(&db).unwrap();
        store.put_session(&session).unwrap();
    }
    let store = SqliteStore::open(&db).unwrap();
    assert_eq!(store.get_session(&session.key()).unwrap(), Some(session));
}

#[test]
fn test_closed_store_refuses_work_and_frees_the_lock() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("focus.db");
    let mut store = SqliteStore::open(&db).unwrap();
    assert!(probe_running(&db).unwrap());

    store.close().unwrap();
    store.close().unwrap();
    assert!(!probe_running(&db).unwrap());
    let err = store.put_session(&finished(at(4, 9, 0), 25, &[])).unwrap_err();
    assert!(matches!(err, CoreError::Database(DatabaseError::Closed)));

    let other = SqliteStore::open(&db).unwrap();
    assert!(matches!(
        store.reopen().unwrap_err(),
        CoreError::AlreadyRunning
    ));
    drop(other);
    store.reopen().unwrap();
    assert!(store.is_open());
}

#[test]
fn test_retagging_rewrites_in_place() {
    let dir = TempDir::new().unwrap();
    let mut store = SqliteStore::open(&dir.path().join("focus.db")).unwrap();
    fill(&mut store);

    let mut day = store
        .get_sessions_in_range(at(4, 0, 0), at(4, 23, 59), &[])
        .unwrap();
    for s in &mut day {
        s.tags = vec!["retagged".into()];
    }
    store.update_sessions(&day).unwrap();

    let all = store
        .get_sessions_in_range(at(1, 0, 0), at(9, 0, 0), &[])
        .unwrap();
    assert_eq!(all.len(), 4);
    let retagged = store
        .get_sessions_in_range(at(1, 0, 0), at(9, 0, 0), &["retagged".to_string()])
        .unwrap();
    assert_eq!(keys(&retagged), keys(&day));

    store.delete_sessions(&keys(&retagged)).unwrap();
    let left = store
        .get_sessions_in_range(at(1, 0, 0), at(9, 0, 0), &[])
        .unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].start_time, at(5, 9, 0));
}
