//! Statistics over stored work sessions.
//!
//! [`Filter`] turns command line bounds into a [`QueryWindow`];
//! [`aggregate`] turns the sessions inside it into a [`Stats`] report.

mod aggregate;
mod period;

pub use aggregate::{aggregate, Histograms, Stats, Summary, TimelineEntry, UNCATEGORIZED};
pub use period::{parse_date, parse_since, Filter, Period, QueryWindow};
