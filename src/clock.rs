//! Wall-clock helpers shared by the timer, the aggregator and the store.
//!
//! Timestamps are unix seconds as `f64`, the unit the persisted files use.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in seconds. A clock before the epoch reads as zero.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[allow(
    clippy::as_conversions,
    clippy::cast_possible_truncation,
    reason = "unix seconds fit in i64 for any realistic clock; the value is floored first"
)]
fn to_local(ts: f64) -> Option<DateTime<Local>> {
    if !ts.is_finite() {
        return None;
    }
    Local.timestamp_opt(ts.floor() as i64, 0).earliest()
}

/// Local calendar date of a unix timestamp.
pub fn local_date(ts: f64) -> NaiveDate {
    to_local(ts).map_or(NaiveDate::MIN, |dt| dt.date_naive())
}

/// Today's local calendar date.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Unix timestamp of local midnight at the start of `date`.
#[allow(
    clippy::as_conversions,
    clippy::cast_precision_loss,
    reason = "unix seconds stay well below 2^53"
)]
pub fn local_midnight(date: NaiveDate) -> f64 {
    let naive = date.and_time(NaiveTime::default());
    let secs = Local
        .from_local_datetime(&naive)
        .earliest()
        .map_or_else(|| naive.and_utc().timestamp(), |dt| dt.timestamp());
    secs as f64
}

/// Format a duration as `HH:MM:SS`. Hours are not wrapped at 24.
/// Negative or non-finite inputs read as zero.
#[allow(
    clippy::as_conversions,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "input is clamped to a non-negative finite value and floored"
)]
pub fn format_hms(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
