//! Property tests: whatever the user and the host do, every session the
//! engine persists keeps a well-formed timeline.

use chrono::{Duration, Local, TimeZone};
use focus_core::{
    Config, Effect, ManualClock, Session, SessionName, TimerEngine, TimerEvent, TimerOptions,
    TimerOverrides, TimerState,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    /// Let this many seconds pass, then tick.
    Wait(i64),
    /// Let this many milliseconds pass without a tick.
    Drift(i64),
    /// Wall clock jumps by this many seconds without the process running.
    Suspend(i64),
    TogglePause,
    Continue,
    SkipBreak,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (1i64..900).prop_map(Op::Wait),
        2 => (1i64..600_000).prop_map(Op::Drift),
        1 => (2i64..7200).prop_map(Op::Suspend),
        2 => Just(Op::TogglePause),
        1 => Just(Op::Continue),
        1 => Just(Op::SkipBreak),
    ]
}

fn persisted(effects: &[Effect]) -> impl Iterator<Item = &Session> {
    effects.iter().filter_map(|e| match e {
        Effect::PersistSession(s) => Some(s),
        _ => None,
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn persisted_sessions_keep_timeline_invariants(
        ops in prop::collection::vec(op(), 1..60),
        interrupt in any::<bool>(),
    ) {
        let clock = ManualClock::new(Local.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap());
        let opts = TimerOptions::from_config(&Config::default(), &TimerOverrides::default()).unwrap();
        let mut engine = TimerEngine::new(opts);
        let mut written: Vec<Session> = Vec::new();

        written.extend(persisted(&engine.handle(TimerEvent::Start, &clock)).cloned());
        for op in ops {
            let event = match op {
                Op::Wait(secs) => {
                    clock.advance(Duration::seconds(secs));
                    TimerEvent::Tick
                }
                Op::Drift(ms) => {
                    clock.advance(Duration::milliseconds(ms));
                    continue;
                }
                Op::Suspend(secs) => {
                    clock.jump_wall(Duration::seconds(secs));
                    clock.advance(Duration::seconds(1));
                    TimerEvent::Tick
                }
                Op::TogglePause => TimerEvent::TogglePause,
                Op::Continue => TimerEvent::UserEnter,
                Op::SkipBreak => TimerEvent::SkipBreak,
            };
            written.extend(persisted(&engine.handle(event, &clock)).cloned());
            if engine.auto_start_pending() {
                written.extend(persisted(&engine.handle(TimerEvent::AutoStart, &clock)).cloned());
            }
            if let Some(current) = engine.current() {
                prop_assert!(current.check_invariants().is_ok(), "{:?}", current.check_invariants());
            }
        }

        let last = if interrupt { TimerEvent::Interrupt } else { TimerEvent::Quit };
        written.extend(persisted(&engine.handle(last, &clock)).cloned());
        prop_assert_eq!(engine.state(), TimerState::Terminated);

        for s in &written {
            prop_assert_eq!(s.name, SessionName::Work);
            prop_assert!(s.check_invariants().is_ok(), "{:?}: {:?}", s, s.check_invariants());
            if s.completed {
                prop_assert_eq!(s.elapsed(), s.duration);
            }
        }
    }

    #[test]
    fn session_json_is_stable(mins in 1i64..120, ran in 0i64..7200, tags in prop::collection::vec("[a-z]{1,8}", 0..3)) {
        let start = Local.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let mut s = Session::new(SessionName::Work, Duration::minutes(mins), tags, start);
        s.advance(start + Duration::seconds(ran));
        s.normalise();

        let first = serde_json::to_string(&s).unwrap();
        let back: Session = serde_json::from_str(&first).unwrap();
        prop_assert_eq!(&back, &s);
        prop_assert_eq!(serde_json::to_string(&back).unwrap(), first);
    }
}
