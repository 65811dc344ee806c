//! End-to-end timer scenarios driven by a manual clock.

use chrono::{DateTime, Duration, Local, TimeZone};
use focus_core::integrations::Noop;
use focus_core::logging;
use focus_core::storage::SessionStore;
use focus_core::timer::{recover, ResumeRequest};
use focus_core::{
    aggregate, Capabilities, Clock, Config, Dispatcher, ManualClock, MemoryStore, QueryWindow, Runner,
    Session, SessionName, SqliteStore, TimerEngine, TimerEvent, TimerOptions, TimerOverrides,
    TimerState,
};
use tempfile::TempDir;

const CAPS: Capabilities<'static> = Capabilities {
    notifier: &Noop,
    sound: &Noop,
    command: &Noop,
};

fn start_time() -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

fn default_opts() -> TimerOptions {
    TimerOptions::from_config(&Config::default(), &TimerOverrides::default()).unwrap()
}

fn only_session(store: &dyn SessionStore) -> Session {
    let all = store
        .get_sessions_in_range(
            start_time() - Duration::days(1),
            start_time() + Duration::days(1),
            &[],
        )
        .unwrap();
    assert_eq!(all.len(), 1, "expected exactly one stored session");
    all.into_iter().next().unwrap()
}

#[test]
fn test_basic_cycle_persists_only_work_sessions() {
    logging::init_test();
    let clock = ManualClock::new(start_time());
    let mut store = MemoryStore::new();
    let mut renderer = Noop;
    let mut runner = Runner::new(
        TimerEngine::new(default_opts()),
        Dispatcher::new(&mut store, CAPS),
        &mut renderer,
        &clock,
    );

    runner.step(TimerEvent::Start).unwrap();
    let mut seen = Vec::new();
    let mut cycles = Vec::new();
    for _ in 0..8 {
        let current = runner.engine().current().unwrap().clone();
        seen.push(current.name);
        cycles.push(runner.engine().work_cycle());
        clock.advance(current.duration);
        runner.step(TimerEvent::Tick).unwrap();
        if runner.engine().state() == TimerState::AwaitingUserContinue {
            clock.advance(Duration::seconds(3));
            runner.step(TimerEvent::UserEnter).unwrap();
        }
    }
    seen.push(runner.engine().current().unwrap().name);
    cycles.push(runner.engine().work_cycle());
    runner.step(TimerEvent::Quit).unwrap();
    drop(runner);

    use SessionName::*;
    assert_eq!(
        seen,
        vec![Work, ShortBreak, Work, ShortBreak, Work, ShortBreak, Work, LongBreak, Work]
    );
    assert_eq!(cycles, vec![1, 1, 2, 2, 3, 3, 4, 4, 1]);

    let work = store.all_sessions();
    assert_eq!(work.len(), 5);
    assert!(work.iter().all(|s| s.name == Work));
    assert!(work[..4].iter().all(|s| s.completed));
    assert!(!work[4].completed);
    for s in &work {
        s.check_invariants().unwrap();
    }
}

#[test]
fn test_pause_and_resume_gives_two_segments() {
    logging::init_test();
    let clock = ManualClock::new(start_time());
    let mut store = MemoryStore::new();
    let mut renderer = Noop;
    let mut runner = Runner::new(
        TimerEngine::new(default_opts()),
        Dispatcher::new(&mut store, CAPS),
        &mut renderer,
        &clock,
    );

    runner.step(TimerEvent::Start).unwrap();
    clock.advance(Duration::minutes(10));
    runner.step(TimerEvent::Tick).unwrap();
    runner.step(TimerEvent::TogglePause).unwrap();
    assert_eq!(runner.engine().state(), TimerState::Paused);

    clock.advance(Duration::minutes(5));
    runner.step(TimerEvent::Tick).unwrap();
    runner.step(TimerEvent::TogglePause).unwrap();
    clock.advance(Duration::minutes(15));
    runner.step(TimerEvent::Tick).unwrap();
    runner.step(TimerEvent::Quit).unwrap();
    drop(runner);

    let s = only_session(&store);
    assert!(s.completed);
    assert_eq!(s.duration, Duration::minutes(25));
    assert_eq!(s.timeline.len(), 2);
    assert_eq!(s.elapsed(), Duration::minutes(25));
    assert_eq!(s.end_time - s.start_time, Duration::minutes(30));
}

#[test]
fn test_interrupt_then_recover_completes_the_same_session() {
    logging::init_test();
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("focus.db");
    let clock = ManualClock::new(start_time());

    {
        let mut store = SqliteStore::open(&db).unwrap();
        let mut renderer = Noop;
        let mut runner = Runner::new(
            TimerEngine::new(default_opts()),
            Dispatcher::new(&mut store, CAPS),
            &mut renderer,
            &clock,
        );
        runner.step(TimerEvent::Start).unwrap();
        clock.advance(Duration::minutes(7));
        runner.step(TimerEvent::Tick).unwrap();
        runner.step(TimerEvent::Interrupt).unwrap();
        assert!(runner.engine().is_terminated());
        assert!(!runner.store().is_open());
    }

    let mut store = SqliteStore::open(&db).unwrap();
    let suspended = only_session(&store);
    assert!(!suspended.completed);
    assert_eq!(suspended.timeline.len(), 1);
    assert_eq!(suspended.elapsed(), Duration::minutes(7));
    assert_eq!(store.list_timers().unwrap().len(), 1);

    clock.advance(Duration::hours(2));
    let engine = recover(&mut store, &ResumeRequest::default()).unwrap();
    let mut renderer = Noop;
    let mut runner = Runner::new(engine, Dispatcher::new(&mut store, CAPS), &mut renderer, &clock);
    runner.step(TimerEvent::Start).unwrap();
    clock.advance(Duration::minutes(18));
    runner.step(TimerEvent::Tick).unwrap();
    drop(runner);

    let done = only_session(&store);
    assert!(done.completed);
    assert_eq!(done.start_time, start_time());
    assert_eq!(done.timeline.len(), 2);
    assert_eq!(done.elapsed(), Duration::minutes(25));
    assert!(store.list_timers().unwrap().is_empty());
}

#[test]
fn test_host_suspend_is_cut_out_of_the_timeline() {
    logging::init_test();
    let clock = ManualClock::new(start_time());
    let mut store = MemoryStore::new();
    let mut renderer = Noop;
    let mut runner = Runner::new(
        TimerEngine::new(default_opts()),
        Dispatcher::new(&mut store, CAPS),
        &mut renderer,
        &clock,
    );

    runner.step(TimerEvent::Start).unwrap();
    clock.advance(Duration::minutes(5));
    runner.step(TimerEvent::Tick).unwrap();

    clock.jump_wall(Duration::minutes(60));
    clock.advance(Duration::seconds(30));
    runner.step(TimerEvent::Tick).unwrap();

    let current = runner.engine().current().unwrap();
    assert_eq!(current.timeline.len(), 2);
    assert_eq!(current.elapsed(), Duration::seconds(330));

    clock.advance(Duration::seconds(25 * 60 - 330));
    runner.step(TimerEvent::Tick).unwrap();
    runner.step(TimerEvent::Quit).unwrap();
    drop(runner);

    let s = only_session(&store);
    assert!(s.completed);
    assert_eq!(s.duration, Duration::minutes(25));
    assert_eq!(s.timeline[0].duration(), Duration::seconds(330));
    assert_eq!(s.elapsed(), Duration::minutes(25));
    assert_eq!(s.end_time - s.start_time, Duration::minutes(85));
    s.check_invariants().unwrap();
}

#[test]
fn test_range_scan_steps_back_one_record() {
    logging::init_test();
    let dir = TempDir::new().unwrap();
    let mut store = SqliteStore::open(&dir.path().join("focus.db")).unwrap();
    let at = |h, m| Local.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap();

    for start in [at(9, 0), at(10, 0)] {
        let mut s = Session::new(SessionName::Work, Duration::minutes(25), vec![], start);
        s.advance(start + Duration::minutes(25));
        s.complete();
        store.put_session(&s).unwrap();
    }

    let found = store.get_sessions_in_range(at(9, 20), at(9, 45), &[]).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].start_time, at(9, 0));
}

#[test]
fn test_aggregator_buckets_a_late_session() {
    logging::init_test();
    let start = Local.with_ymd_and_hms(2024, 3, 4, 22, 30, 0).unwrap();
    let mut s = Session::new(
        SessionName::Work,
        Duration::minutes(60),
        vec!["deep-work".into()],
        start,
    );
    s.advance(start + Duration::minutes(60));
    s.complete();

    let window = QueryWindow::new(
        Local.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap(),
        Local.with_ymd_and_hms(2024, 3, 4, 23, 59, 59).unwrap(),
    )
    .unwrap();
    let stats = aggregate(&[s], &window);

    assert_eq!(stats.histograms.hourly[22], Duration::minutes(30));
    assert_eq!(stats.histograms.hourly[23], Duration::minutes(30));
    assert_eq!(stats.histograms.weekday[1], Duration::minutes(60));
    assert_eq!(stats.summary.tags["deep-work"], Duration::minutes(60));
}

#[test]
fn test_backfilled_session_completes_in_the_past() {
    logging::init_test();
    let clock = ManualClock::new(start_time());
    let mut store = MemoryStore::new();
    let since = start_time() - Duration::minutes(30);
    focus_core::timer::check_backfill(&store, since, clock.now()).unwrap();

    let mut opts = default_opts();
    opts.since = Some(since);
    opts.auto_start_break = false;
    let mut renderer = Noop;
    let mut runner = Runner::new(
        TimerEngine::new(opts),
        Dispatcher::new(&mut store, CAPS),
        &mut renderer,
        &clock,
    );
    runner.step(TimerEvent::Start).unwrap();
    assert_eq!(runner.engine().state(), TimerState::AwaitingUserContinue);
    runner.step(TimerEvent::Quit).unwrap();
    drop(runner);

    let s = only_session(&store);
    assert!(s.completed);
    assert_eq!(s.start_time, since);
    assert_eq!(s.end_time, since + Duration::minutes(25));
}
