//! Work and break sessions and their segmented timelines.
//!
//! A session keeps its original `start_time` for life; it is the store key.
//! Each stretch of uninterrupted running time is one [`Segment`]. Pausing
//! and resuming, or being interrupted and recovered, appends segments.

use std::fmt;

use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};

use crate::timeutil;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SessionName {
    #[serde(rename = "Work session")]
    Work,
    #[serde(rename = "Short break")]
    ShortBreak,
    #[serde(rename = "Long break")]
    LongBreak,
}

impl SessionName {
    pub fn label(&self) -> &'static str {
        match self {
            SessionName::Work => "Work session",
            SessionName::ShortBreak => "Short break",
            SessionName::LongBreak => "Long break",
        }
    }

    pub fn is_work(&self) -> bool {
        matches!(self, SessionName::Work)
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One uninterrupted stretch of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
}

impl Segment {
    pub fn new(start_time: DateTime<Local>, end_time: DateTime<Local>) -> Self {
        Self {
            start_time,
            end_time,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub name: SessionName,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Target length.
    #[serde(with = "timeutil::nanos")]
    pub duration: Duration,
    pub completed: bool,
    pub timeline: Vec<Segment>,
}

impl Session {
    /// A fresh session whose single segment is still empty.
    pub fn new(
        name: SessionName,
        duration: Duration,
        tags: Vec<String>,
        start: DateTime<Local>,
    ) -> Self {
        Self {
            start_time: start,
            end_time: start,
            name,
            tags,
            duration,
            completed: false,
            timeline: vec![Segment::new(start, start)],
        }
    }

    /// Store key for this session.
    pub fn key(&self) -> String {
        timeutil::to_key(&self.start_time)
    }

    /// Sum of all segment lengths.
    pub fn elapsed(&self) -> Duration {
        self.timeline
            .iter()
            .fold(Duration::zero(), |acc, seg| acc + seg.duration())
    }

    /// Target minus elapsed, never negative.
    pub fn remaining(&self) -> Duration {
        (self.duration - self.elapsed()).max(Duration::zero())
    }

    /// Where the session will end if it runs uninterrupted from `now`.
    pub fn planned_end(&self, now: DateTime<Local>) -> DateTime<Local> {
        now + self.remaining()
    }

    /// Start a new segment at `now`.
    ///
    /// No-op when the current segment is still empty and already starts at
    /// `now`, so a session that has never run keeps a single segment.
    pub fn open_segment(&mut self, now: DateTime<Local>) {
        let start = now.max(self.end_time);
        if let Some(last) = self.timeline.last() {
            if last.start_time == last.end_time && last.start_time == start {
                return;
            }
        }
        self.timeline.push(Segment::new(start, start));
        self.end_time = start;
    }

    /// Extend the current segment up to `now`.
    pub fn advance(&mut self, now: DateTime<Local>) {
        if let Some(last) = self.timeline.last_mut() {
            last.end_time = now.max(last.start_time);
            self.end_time = last.end_time;
        }
    }

    /// Pull the end of the current segment back by `by`, used to cut out
    /// time the host spent suspended.
    pub fn pull_back(&mut self, by: Duration) {
        if let Some(last) = self.timeline.last_mut() {
            last.end_time = (last.end_time - by).max(last.start_time);
            self.end_time = last.end_time;
        }
    }

    /// Make the timeline sum exactly to the target and mark the session
    /// completed.
    ///
    /// Overshoot is cut at the point where the target was reached, dropping
    /// any segments after it. A short timeline is extended at its end.
    pub fn complete(&mut self) {
        let mut left = self.duration;
        let mut keep = self.timeline.len();
        for (i, seg) in self.timeline.iter_mut().enumerate() {
            let len = seg.duration();
            if len >= left {
                seg.end_time = seg.start_time + left;
                left = Duration::zero();
                keep = i + 1;
                break;
            }
            left = left - len;
        }
        self.timeline.truncate(keep);

        if let Some(last) = self.timeline.last_mut() {
            last.end_time = last.end_time + left;
            self.end_time = last.end_time;
        }
        self.completed = true;
    }

    /// Complete the session if its timeline already covers the target.
    ///
    /// Wall time may overshoot the target (late tick, host sleep); this
    /// trims the overshoot before the record is written.
    pub fn normalise(&mut self) {
        if !self.completed && self.elapsed() >= self.duration {
            self.complete();
        } else if self.completed && self.elapsed() != self.duration {
            self.complete();
        }
    }

    /// Whether the session carries any of `tags`. An empty filter matches.
    pub fn matches_tags(&self, tags: &[String]) -> bool {
        tags.is_empty() || self.tags.iter().any(|t| tags.contains(t))
    }

    /// Whether `[start_time, end_time]` intersects `[from, to]`.
    pub fn overlaps(&self, from: DateTime<Local>, to: DateTime<Local>) -> bool {
        self.start_time <= to && self.end_time >= from
    }

    /// Check the timeline invariants, describing the first violation.
    pub fn check_invariants(&self) -> Result<(), String> {
        let first = self.timeline.first().ok_or("timeline is empty")?;
        if first.start_time != self.start_time {
            return Err("first segment does not begin at start_time".into());
        }
        let last = self.timeline.last().ok_or("timeline is empty")?;
        if last.end_time != self.end_time {
            return Err("last segment does not end at end_time".into());
        }
        for (i, seg) in self.timeline.iter().enumerate() {
            if seg.start_time > seg.end_time {
                return Err(format!("segment {i} ends before it starts"));
            }
            if i > 0 && seg.start_time < self.timeline[i - 1].end_time {
                return Err(format!("segment {i} overlaps the one before it"));
            }
        }
        let elapsed = self.elapsed();
        if self.completed && elapsed != self.duration {
            return Err(format!("completed session spans {elapsed} instead of {}", self.duration));
        }
        if !self.completed && elapsed > self.duration {
            return Err(format!("unfinished session spans {elapsed}, over its target"));
        }
        Ok(())
    }
}

/// Split a comma separated tag list, trimming whitespace and dropping blanks.
pub fn parse_tags(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
    }

    fn work() -> Session {
        Session::new(SessionName::Work, Duration::minutes(25), vec![], t0())
    }

    #[test]
    fn new_session_is_one_empty_segment() {
        let s = work();
        assert_eq!(s.timeline.len(), 1);
        assert_eq!(s.end_time, s.start_time);
        assert!(s.check_invariants().is_ok());
    }

    #[test]
    fn pause_and_resume_adds_segment() {
        let mut s = work();
        s.advance(t0() + Duration::minutes(10));

        s.open_segment(t0() + Duration::minutes(15));
        assert_eq!(s.timeline.len(), 2);
        assert_eq!(s.remaining(), Duration::minutes(15));
        assert_eq!(s.planned_end(t0() + Duration::minutes(15)), t0() + Duration::minutes(30));

        s.advance(t0() + Duration::minutes(30));
        s.normalise();
        assert!(s.completed);
        assert_eq!(s.elapsed(), Duration::minutes(25));
        assert_eq!(s.end_time - s.start_time, Duration::minutes(30));
        assert!(s.check_invariants().is_ok());
    }

    #[test]
    fn opening_a_never_started_session_keeps_one_segment() {
        let mut s = work();
        s.open_segment(t0());
        assert_eq!(s.timeline.len(), 1);
    }

    #[test]
    fn complete_trims_overshoot() {
        let mut s = work();
        s.advance(t0() + Duration::minutes(5));
        s.open_segment(t0() + Duration::minutes(6));
        s.advance(t0() + Duration::hours(3));
        s.complete();
        assert_eq!(s.elapsed(), Duration::minutes(25));
        assert_eq!(s.timeline[1].end_time, t0() + Duration::minutes(26));
        assert_eq!(s.end_time, s.timeline[1].end_time);
    }

    #[test]
    fn complete_drops_segments_past_the_target() {
        let mut s = work();
        s.advance(t0() + Duration::minutes(20));
        s.open_segment(t0() + Duration::minutes(21));
        s.advance(t0() + Duration::minutes(27));
        s.open_segment(t0() + Duration::minutes(30));
        s.advance(t0() + Duration::minutes(31));
        s.complete();
        assert_eq!(s.timeline.len(), 2);
        assert_eq!(s.elapsed(), Duration::minutes(25));
        assert_eq!(s.end_time, t0() + Duration::minutes(26));
        assert!(s.check_invariants().is_ok());
    }

    #[test]
    fn complete_extends_a_short_timeline() {
        let mut s = work();
        s.advance(t0() + Duration::minutes(10));
        s.complete();
        assert_eq!(s.elapsed(), Duration::minutes(25));
        assert!(s.check_invariants().is_ok());
    }

    #[test]
    fn normalise_leaves_unfinished_sessions_alone() {
        let mut s = work();
        s.advance(t0() + Duration::minutes(7));
        s.normalise();
        assert!(!s.completed);
        assert_eq!(s.elapsed(), Duration::minutes(7));
    }

    #[test]
    fn pull_back_never_crosses_segment_start() {
        let mut s = work();
        s.advance(t0() + Duration::minutes(2));
        s.pull_back(Duration::minutes(5));
        assert_eq!(s.end_time, t0());
    }

    #[test]
    fn tags_filter_and_parse() {
        let mut s = work();
        s.tags = parse_tags(" deep-work , writing,, ");
        assert_eq!(s.tags, vec!["deep-work", "writing"]);
        assert!(s.matches_tags(&[]));
        assert!(s.matches_tags(&["writing".into(), "x".into()]));
        assert!(!s.matches_tags(&["x".into()]));
    }

    #[test]
    fn serialized_names_and_duration_units() {
        let json = serde_json::to_value(work()).unwrap();
        assert_eq!(json["name"], "Work session");
        assert_eq!(json["duration"], 25 * 60 * 1_000_000_000i64);
        assert!(json["timeline"][0]["start_time"].is_string());
    }
}
