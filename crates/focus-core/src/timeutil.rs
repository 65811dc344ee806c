//! Time helpers shared by the store, the engine and the aggregator.

use chrono::{
    DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    SecondsFormat, TimeZone, Utc,
};

use crate::error::{CoreError, Result};

pub const HOURS_IN_A_DAY: i64 = 24;

/// Encode a timestamp as a store key.
///
/// Keys are UTC RFC3339 with exactly nine fractional digits, so byte order
/// equals chronological order no matter which offset the session was
/// recorded under.
pub fn to_key(t: &DateTime<Local>) -> String {
    t.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Decode any RFC3339 timestamp (canonical key or legacy key).
pub fn parse_key(key: &str) -> Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(key)
        .map(|t| t.with_timezone(&Local))
        .map_err(|e| CoreError::invalid(format!("bad timestamp key '{key}': {e}")))
}

/// Parse a duration literal such as `25m`, `1h30m` or `90s`. A bare number is
/// taken as minutes. The result must be strictly positive.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CoreError::invalid("duration must not be empty"));
    }

    let parsed = if let Ok(mins) = trimmed.parse::<f64>() {
        if !mins.is_finite() {
            return Err(CoreError::invalid(format!("'{input}' is not a valid duration")));
        }
        Duration::milliseconds((mins * 60_000.0).round() as i64)
    } else {
        let std = humantime::parse_duration(trimmed)
            .map_err(|e| CoreError::invalid(format!("'{input}' is not a valid duration: {e}")))?;
        Duration::from_std(std)
            .map_err(|_| CoreError::invalid(format!("'{input}' is out of range")))?
    };

    if parsed <= Duration::zero() {
        return Err(CoreError::invalid(format!(
            "duration '{input}' must be greater than zero"
        )));
    }
    Ok(parsed)
}

/// Render a duration back into a literal `parse_duration` accepts.
pub fn format_duration(d: Duration) -> String {
    let secs = d.num_seconds().max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{h}h"));
    }
    if m > 0 {
        out.push_str(&format!("{m}m"));
    }
    if s > 0 || out.is_empty() {
        out.push_str(&format!("{s}s"));
    }
    out
}

/// `mm:ss` countdown text, rounding to the nearest second.
pub fn format_clock(d: Duration) -> String {
    let total = ((d.num_milliseconds().max(0) as f64) / 1000.0).round() as i64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// `1h 05m` style text for reports.
pub fn format_hours_mins(d: Duration) -> String {
    let mins = d.num_minutes().max(0);
    let (h, m) = (mins / 60, mins % 60);
    if h > 0 {
        format!("{h}h {m:02}m")
    } else {
        format!("{m}m")
    }
}

/// Resolve a naive local time, picking the earlier instant on DST folds and
/// skipping forward over DST gaps.
pub fn local(naive: NaiveDateTime) -> DateTime<Local> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(early, _) => early,
        LocalResult::None => {
            let shifted = naive + Duration::hours(1);
            Local
                .from_local_datetime(&shifted)
                .earliest()
                .unwrap_or_else(|| Utc.from_utc_datetime(&naive).with_timezone(&Local))
        }
    }
}

/// Midnight at the start of `t`'s day.
pub fn start_of_day(t: DateTime<Local>) -> DateTime<Local> {
    local(t.date_naive().and_time(NaiveTime::MIN))
}

/// 23:59:59 on `t`'s day.
pub fn end_of_day(t: DateTime<Local>) -> DateTime<Local> {
    let last = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    local(t.date_naive().and_time(last))
}

/// `YYYYMMDD` as an integer.
pub fn day_number(date: NaiveDate) -> u32 {
    date.year().max(0) as u32 * 10_000 + date.month() * 100 + date.day()
}

/// The earliest instant a query window may start at.
pub fn beginning_of_time() -> DateTime<Local> {
    DateTime::<Utc>::UNIX_EPOCH.with_timezone(&Local)
}

/// Serde adapter storing a [`Duration`] as integer nanoseconds.
pub mod nanos {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_nanoseconds().unwrap_or(i64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::nanoseconds(i64::deserialize(d)?))
    }
}

/// Serde adapter storing a [`Duration`] as a duration literal (`25m`).
pub mod literal {
    use chrono::Duration;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Minutes(f64),
            Text(String),
        }

        match Raw::deserialize(d)? {
            Raw::Minutes(m) => super::parse_duration(&m.to_string()),
            Raw::Text(t) => super::parse_duration(&t),
        }
        .map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_sort_chronologically() {
        let a = Local.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let b = a + Duration::nanoseconds(1);
        let c = a + Duration::days(400);
        let (ka, kb, kc) = (to_key(&a), to_key(&b), to_key(&c));
        assert!(ka < kb && kb < kc);
        assert_eq!(ka.len(), kb.len());
        assert!(ka.ends_with('Z'));
        assert_eq!(parse_key(&ka).unwrap(), a);
    }

    #[test]
    fn bare_numbers_are_minutes() {
        assert_eq!(parse_duration("25").unwrap(), Duration::minutes(25));
        assert_eq!(parse_duration("0.5").unwrap(), Duration::seconds(30));
    }

    #[test]
    fn duration_literals_parse() {
        assert_eq!(parse_duration("25m").unwrap(), Duration::minutes(25));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::minutes(90));
        assert_eq!(parse_duration("45s").unwrap(), Duration::seconds(45));
    }

    #[test]
    fn zero_and_garbage_are_rejected() {
        assert!(parse_duration("0").is_err());
        assert!(parse_duration("-5").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn format_duration_roundtrips_through_parse() {
        for d in [Duration::minutes(25), Duration::minutes(90), Duration::seconds(75)] {
            assert_eq!(parse_duration(&format_duration(d)).unwrap(), d);
        }
    }

    #[test]
    fn clock_text_rounds_to_seconds() {
        assert_eq!(format_clock(Duration::milliseconds(61_400)), "01:01");
        assert_eq!(format_clock(Duration::seconds(-3)), "00:00");
        assert_eq!(format_hours_mins(Duration::minutes(125)), "2h 05m");
    }

    #[test]
    fn day_bounds() {
        let t = Local.with_ymd_and_hms(2024, 5, 6, 13, 14, 15).unwrap();
        assert_eq!(start_of_day(t).format("%H:%M:%S").to_string(), "00:00:00");
        assert_eq!(end_of_day(t).format("%H:%M:%S").to_string(), "23:59:59");
        assert_eq!(day_number(t.date_naive()), 20240506);
    }
}
