//! Query windows: named periods and explicit start/end bounds.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::timeutil::{beginning_of_time, end_of_day, local, start_of_day};

/// Named reporting periods accepted by `--period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    Today,
    Yesterday,
    Days7,
    Days14,
    Days30,
    Days90,
    Days180,
    Days365,
    AllTime,
}

impl Period {
    pub const ALL: [Period; 9] = [
        Period::AllTime,
        Period::Today,
        Period::Yesterday,
        Period::Days7,
        Period::Days14,
        Period::Days30,
        Period::Days90,
        Period::Days180,
        Period::Days365,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Today => "today",
            Period::Yesterday => "yesterday",
            Period::Days7 => "7days",
            Period::Days14 => "14days",
            Period::Days30 => "30days",
            Period::Days90 => "90days",
            Period::Days180 => "180days",
            Period::Days365 => "365days",
            Period::AllTime => "all-time",
        }
    }

    /// Days to step back from today to reach the first day of the period.
    fn days_back(&self) -> i64 {
        match self {
            Period::Today | Period::AllTime => 0,
            Period::Yesterday => 1,
            Period::Days7 => 6,
            Period::Days14 => 13,
            Period::Days30 => 29,
            Period::Days90 => 89,
            Period::Days180 => 179,
            Period::Days365 => 364,
        }
    }

    /// The window this period covers relative to `now`. Every period except
    /// `yesterday` runs to the end of today.
    pub fn window(&self, now: DateTime<Local>) -> QueryWindow {
        match self {
            Period::AllTime => QueryWindow {
                start: beginning_of_time(),
                end: end_of_day(now),
            },
            Period::Yesterday => {
                let day = now - Duration::days(1);
                QueryWindow {
                    start: start_of_day(day),
                    end: end_of_day(day),
                }
            }
            p => QueryWindow {
                start: start_of_day(now - Duration::days(p.days_back())),
                end: end_of_day(now),
            },
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Period::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<_> = Period::ALL.iter().map(Period::as_str).collect();
                CoreError::invalid(format!(
                    "unknown period '{s}', expected one of: {}",
                    names.join(", ")
                ))
            })
    }
}

/// Inclusive time range a query or report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryWindow {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

impl QueryWindow {
    pub fn new(start: DateTime<Local>, end: DateTime<Local>) -> Result<Self> {
        if end < start {
            return Err(CoreError::invalid(
                "the start time must be earlier than the end time",
            ));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, t: DateTime<Local>) -> bool {
        self.start <= t && t <= self.end
    }

    pub fn is_all_time(&self) -> bool {
        self.start <= beginning_of_time()
    }
}

/// Window plus tag filter, as given to `stats`, `list`, `delete` and
/// `edit-tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub window: QueryWindow,
    /// Match sessions carrying any of these. Empty matches all.
    pub tags: Vec<String>,
}

impl Filter {
    /// Resolve command line bounds.
    ///
    /// `period` wins over `start`/`end`. With neither, the last seven days
    /// are used; an `end` on its own is rejected. Without `end` the window runs to `now`, or to the end of the
    /// start day when `start` lies in the future.
    pub fn resolve(
        period: Option<&str>,
        start: Option<&str>,
        end: Option<&str>,
        tags: Vec<String>,
        now: DateTime<Local>,
    ) -> Result<Self> {
        let window = match (period, start) {
            (Some(p), _) => p.parse::<Period>()?.window(now),
            (None, None) if end.is_some() => {
                return Err(CoreError::invalid("--end needs a --start date"));
            }
            (None, None) => Period::Days7.window(now),
            (None, Some(start)) => {
                let start = parse_date(start)?;
                let end = match end {
                    Some(end) => parse_date(end)?,
                    None if start > now => end_of_day(start),
                    None => now,
                };
                QueryWindow::new(start, end)?
            }
        };
        Ok(Self { window, tags })
    }
}

const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %I:%M:%S %p",
    "%Y-%m-%d %I:%M %p",
    "%Y-%m-%d %H:%M",
];

/// Parse `YYYY-MM-DD`, optionally followed by a 24-hour or AM/PM time.
pub fn parse_date(input: &str) -> Result<DateTime<Local>> {
    let s = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(local(date.and_time(NaiveTime::MIN)));
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(local)
        .ok_or_else(|| {
            CoreError::invalid(format!(
                "'{input}' is not a valid date, expected YYYY-MM-DD [HH:MM:SS PM]"
            ))
        })
}

const CLOCK_FORMATS: [&str; 4] = ["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M:%S %p"];

/// Parse a `--since` expression: `<duration> ago` (`20 mins ago`), a clock
/// time today (`14:30`, `2:30 PM`), or anything [`parse_date`] accepts.
pub fn parse_since(input: &str, now: DateTime<Local>) -> Result<DateTime<Local>> {
    let s = input.trim();
    if let Some(amount) = s.strip_suffix("ago") {
        let literal: String = amount.split_whitespace().collect();
        let back = crate::timeutil::parse_duration(&literal)?;
        return Ok(now - back);
    }
    if let Some(time) = CLOCK_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
    {
        return Ok(local(now.date_naive().and_time(time)));
    }
    parse_date(s)
}
