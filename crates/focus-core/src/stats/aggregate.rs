//! Minute-precision aggregation of work sessions over a query window.
//!
//! Every timeline segment is walked minute by minute; a minute starting at
//! `m` counts when `window.start <= m <= window.end`. The same walk feeds the
//! summary totals and every histogram, so the histograms always add up to
//! the total. A trailing partial minute counts for its real length.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Timelike};
use serde::Serialize;

use super::period::QueryWindow;
use crate::session::{Segment, Session};
use crate::timeutil::{self, day_number, start_of_day};

/// Pseudo-tag for sessions without tags.
pub const UNCATEGORIZED: &str = "uncategorized";

const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub total_time: Duration,
    pub completed: usize,
    pub abandoned: usize,
    /// Time per tag; untagged time is filed under [`UNCATEGORIZED`].
    pub tags: BTreeMap<String, Duration>,
    pub avg_time: Duration,
    pub avg_completed: i64,
    pub avg_abandoned: i64,
}

/// Time spent per calendar bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histograms {
    /// Hour of day, 0-23.
    pub hourly: [Duration; 24],
    /// Day of week, Sunday = 0.
    pub weekday: [Duration; 7],
    /// Keyed by `YYYYMMDD`.
    pub daily: BTreeMap<u32, Duration>,
    /// Keyed by ISO (year, week).
    pub weekly: BTreeMap<(i32, u32), Duration>,
    /// Month of year, 1-12.
    pub monthly: BTreeMap<u32, Duration>,
    pub yearly: BTreeMap<i32, Duration>,
}

impl Default for Histograms {
    fn default() -> Self {
        Self {
            hourly: [Duration::zero(); 24],
            weekday: [Duration::zero(); 7],
            daily: BTreeMap::new(),
            weekly: BTreeMap::new(),
            monthly: BTreeMap::new(),
            yearly: BTreeMap::new(),
        }
    }
}

impl Histograms {
    fn add(&mut self, at: DateTime<Local>, d: Duration) {
        let date = at.date_naive();
        self.hourly[at.hour() as usize] += d;
        self.weekday[at.weekday().num_days_from_sunday() as usize] += d;
        *self.daily.entry(day_number(date)).or_insert_with(Duration::zero) += d;
        let week = date.iso_week();
        *self
            .weekly
            .entry((week.year(), week.week()))
            .or_insert_with(Duration::zero) += d;
        *self.monthly.entry(date.month()).or_insert_with(Duration::zero) += d;
        *self.yearly.entry(date.year()).or_insert_with(Duration::zero) += d;
    }

    /// Make sure every bucket covering `date` exists.
    fn seed(&mut self, date: NaiveDate) {
        self.daily.entry(day_number(date)).or_insert_with(Duration::zero);
        let week = date.iso_week();
        self.weekly
            .entry((week.year(), week.week()))
            .or_insert_with(Duration::zero);
        self.monthly.entry(date.month()).or_insert_with(Duration::zero);
        self.yearly.entry(date.year()).or_insert_with(Duration::zero);
    }

    pub fn total(&self) -> Duration {
        self.hourly.iter().fold(Duration::zero(), |acc, d| acc + *d)
    }
}

/// Part of a segment that falls on the last day of the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub start_time: DateTime<Local>,
    pub tags: Vec<String>,
    #[serde(with = "timeutil::nanos")]
    pub duration: Duration,
}

/// Everything `stats` reports for one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub window: QueryWindow,
    pub summary: Summary,
    pub histograms: Histograms,
    /// Activity on the last day of the window, in start order.
    pub timeline: Vec<TimelineEntry>,
}

/// Walk `seg` minute by minute, calling `visit` for each minute inside
/// `window` with the minute's start and length.
fn walk_segment(
    seg: &Segment,
    window: &QueryWindow,
    mut visit: impl FnMut(DateTime<Local>, Duration),
) {
    let minute = Duration::minutes(1);
    let mut m = seg.start_time;
    if m < window.start {
        m += Duration::minutes((window.start - m).num_minutes());
    }
    while m < seg.end_time && m <= window.end {
        if m >= window.start {
            visit(m, (seg.end_time - m).min(minute));
        }
        m += minute;
    }
}

/// Aggregate `sessions` over `window`.
///
/// Completed and abandoned counts cover every session given, clipped or
/// not. Averages are per day, with at least one day.
pub fn aggregate(sessions: &[Session], window: &QueryWindow) -> Stats {
    let mut histograms = Histograms::default();
    let mut tags: BTreeMap<String, Duration> = BTreeMap::new();
    let mut total_time = Duration::zero();
    let (mut completed, mut abandoned) = (0usize, 0usize);
    let mut first_minute: Option<DateTime<Local>> = None;

    for session in sessions {
        let mut effective = Duration::zero();
        for seg in &session.timeline {
            walk_segment(seg, window, |m, d| {
                effective += d;
                histograms.add(m, d);
                first_minute = Some(first_minute.map_or(m, |f| f.min(m)));
            });
        }

        total_time += effective;
        if session.tags.is_empty() {
            *tags
                .entry(UNCATEGORIZED.to_string())
                .or_insert_with(Duration::zero) += effective;
        }
        for tag in &session.tags {
            *tags.entry(tag.clone()).or_insert_with(Duration::zero) += effective;
        }
        if session.completed {
            completed += 1;
        } else {
            abandoned += 1;
        }
    }

    // An all-time window starts long before any session; measure it from
    // the first minute that counted.
    let from = if window.is_all_time() {
        first_minute
    } else {
        Some(window.start)
    };

    if let Some(from) = from {
        let mut day = from.date_naive();
        let last = window.end.date_naive();
        while day <= last {
            histograms.seed(day);
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
    }

    let span = window.end - from.unwrap_or(window.end);
    let hours = span.num_seconds() as f64 / 3600.0;
    let days = ((hours / timeutil::HOURS_IN_A_DAY as f64).round() as i64).max(1);

    let summary = Summary {
        total_time,
        completed,
        abandoned,
        tags,
        avg_time: Duration::milliseconds(total_time.num_milliseconds() / days),
        avg_completed: (completed as f64 / days as f64).round() as i64,
        avg_abandoned: (abandoned as f64 / days as f64).round() as i64,
    };

    Stats {
        window: *window,
        summary,
        histograms,
        timeline: last_day(sessions, window),
    }
}

fn last_day(sessions: &[Session], window: &QueryWindow) -> Vec<TimelineEntry> {
    let day_start = start_of_day(window.end).max(window.start);
    let mut entries: Vec<TimelineEntry> = sessions
        .iter()
        .flat_map(|s| s.timeline.iter().map(move |seg| (s, seg)))
        .filter(|(_, seg)| seg.end_time > day_start && seg.start_time <= window.end)
        .map(|(s, seg)| {
            let start = seg.start_time.max(day_start);
            TimelineEntry {
                start_time: start,
                tags: s.tags.clone(),
                duration: seg.end_time.min(window.end) - start,
            }
        })
        .collect();
    entries.sort_by_key(|e| e.start_time);
    entries
}

// ── JSON ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Record {
    name: String,
    duration: i64,
}

#[derive(Debug, Serialize)]
struct Counts {
    completed: i64,
    abandoned: i64,
    duration: i64,
}

#[derive(Debug, Serialize)]
struct StatsJson<'a> {
    start_time: DateTime<Local>,
    end_time: DateTime<Local>,
    totals: Counts,
    averages: Counts,
    tags: Vec<Record>,
    hourly: Vec<Record>,
    weekday: Vec<Record>,
    daily: Vec<Record>,
    weekly: Vec<Record>,
    monthly: Vec<Record>,
    yearly: Vec<Record>,
    timeline: &'a [TimelineEntry],
}

fn nanos(d: Duration) -> i64 {
    d.num_nanoseconds().unwrap_or(i64::MAX)
}

fn record(name: String, d: &Duration) -> Record {
    Record {
        name,
        duration: nanos(*d),
    }
}

pub(crate) fn day_label(key: u32) -> String {
    format!("{:04}-{:02}-{:02}", key / 10_000, key / 100 % 100, key % 100)
}

pub(crate) fn month_label(month: u32) -> &'static str {
    MONTHS
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("?")
}

impl Stats {
    /// Machine-readable report. Durations are nanoseconds; tags are sorted
    /// by time spent, every other list in calendar order.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let s = &self.summary;
        let h = &self.histograms;

        let mut tags: Vec<Record> = s
            .tags
            .iter()
            .map(|(name, d)| record(name.clone(), d))
            .collect();
        tags.sort_by(|a, b| b.duration.cmp(&a.duration).then(a.name.cmp(&b.name)));

        let json = StatsJson {
            start_time: self.window.start,
            end_time: self.window.end,
            totals: Counts {
                completed: s.completed as i64,
                abandoned: s.abandoned as i64,
                duration: nanos(s.total_time),
            },
            averages: Counts {
                completed: s.avg_completed,
                abandoned: s.avg_abandoned,
                duration: nanos(s.avg_time),
            },
            tags,
            hourly: h
                .hourly
                .iter()
                .enumerate()
                .map(|(hour, d)| record(format!("{hour:02}:00"), d))
                .collect(),
            weekday: h
                .weekday
                .iter()
                .zip(WEEKDAYS)
                .map(|(d, name)| record(name.to_string(), d))
                .collect(),
            daily: h.daily.iter().map(|(k, d)| record(day_label(*k), d)).collect(),
            weekly: h
                .weekly
                .iter()
                .map(|((y, w), d)| record(format!("{y}-W{w:02}"), d))
                .collect(),
            monthly: h
                .monthly
                .iter()
                .map(|(m, d)| record(month_label(*m).to_string(), d))
                .collect(),
            yearly: h.yearly.iter().map(|(y, d)| record(y.to_string(), d)).collect(),
            timeline: &self.timeline,
        };
        serde_json::to_string_pretty(&json)
    }

    /// Plain-text report for the terminal.
    pub fn render_report(&self) -> String {
        let s = &self.summary;
        let h = &self.histograms;
        let mut out = String::new();
        let rule = "=".repeat(60);

        out.push_str(&format!(
            "{} - {}\n{rule}\n",
            self.window.start.format("%b %d, %Y"),
            self.window.end.format("%b %d, %Y")
        ));
        out.push_str(&format!(
            "Total time:       {}\n",
            timeutil::format_hours_mins(s.total_time)
        ));
        out.push_str(&format!(
            "Work sessions:    {} completed, {} abandoned\n",
            s.completed, s.abandoned
        ));
        out.push_str(&format!(
            "Daily average:    {} ({} completed, {} abandoned)\n",
            timeutil::format_hours_mins(s.avg_time),
            s.avg_completed,
            s.avg_abandoned
        ));

        if s.total_time > Duration::zero() {
            let mut tags: Vec<_> = s.tags.iter().collect();
            tags.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
            let rows: Vec<(String, Duration)> =
                tags.into_iter().map(|(k, d)| (k.clone(), *d)).collect();
            section(&mut out, "Tags", &rows, Some(s.total_time));
        }

        let weekday: Vec<_> = WEEKDAYS
            .iter()
            .zip(h.weekday)
            .map(|(n, d)| (n.to_string(), d))
            .collect();
        section(&mut out, "Weekday", &weekday, None);

        let hourly: Vec<_> = h
            .hourly
            .iter()
            .enumerate()
            .map(|(hour, d)| (format!("{hour:02}:00"), *d))
            .collect();
        section(&mut out, "Hourly", &hourly, None);

        if h.daily.len() <= 31 {
            let daily: Vec<_> = h.daily.iter().map(|(k, d)| (day_label(*k), *d)).collect();
            section(&mut out, "Daily", &daily, None);
        } else {
            let weekly: Vec<_> = h
                .weekly
                .iter()
                .map(|((y, w), d)| (format!("{y}-W{w:02}"), *d))
                .collect();
            section(&mut out, "Weekly", &weekly, None);
        }
        if h.monthly.len() > 1 {
            let monthly: Vec<_> = h
                .monthly
                .iter()
                .map(|(m, d)| (month_label(*m).to_string(), *d))
                .collect();
            section(&mut out, "Monthly", &monthly, None);
        }
        if h.yearly.len() > 1 {
            let yearly: Vec<_> = h.yearly.iter().map(|(y, d)| (y.to_string(), *d)).collect();
            section(&mut out, "Yearly", &yearly, None);
        }
        out
    }
}

const BAR_WIDTH: i64 = 30;

fn section(out: &mut String, title: &str, rows: &[(String, Duration)], total: Option<Duration>) {
    if rows.is_empty() {
        return;
    }
    out.push_str(&format!("\n{title}\n{}\n", "-".repeat(60)));
    let max = rows
        .iter()
        .map(|(_, d)| d.num_seconds())
        .max()
        .unwrap_or(0)
        .max(1);
    let width = rows.iter().map(|(n, _)| n.chars().count()).max().unwrap_or(0);
    for (name, d) in rows {
        let filled = (d.num_seconds() * BAR_WIDTH + max / 2) / max;
        let bar = "█".repeat(filled.max(0) as usize);
        out.push_str(&format!(
            "{name:<width$}  {:>8}  {bar}",
            timeutil::format_hours_mins(*d)
        ));
        if let Some(total) = total.filter(|t| t.num_seconds() > 0) {
            let pct = d.num_seconds() as f64 * 100.0 / total.num_seconds() as f64;
            out.push_str(&format!(" {pct:.0}%"));
        }
        out.push('\n');
    }
}
