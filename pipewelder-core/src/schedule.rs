//! Schedule normalization
//!
//! Moves a pipeline's start timestamp forward by whole periods until it is
//! no longer in the past, so reactivating an old template never schedules
//! a run in the past. All times are UTC.

use chrono::{TimeDelta, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::error::{CoreError, Result};

pub use chrono::NaiveDateTime;

/// Timestamp format used for `myStartDateTime`
pub const PIPELINE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Period format: `<integer> <plural unit>`, e.g. `15 minutes`
static PERIOD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<number>\d+) (?P<unit>\w+s)$").unwrap());

/// Parse a period such as `"3 hours"` into a duration
///
/// Accepted units are `seconds`, `minutes`, `hours`, `days` and `weeks`.
/// A zero period is rejected.
pub fn parse_period(period: &str) -> Result<TimeDelta> {
    let invalid = || CoreError::InvalidPeriod(period.to_string());

    let captures = PERIOD_RE.captures(period.trim()).ok_or_else(invalid)?;
    let number: i64 = captures["number"].parse().map_err(|_| invalid())?;
    if number == 0 {
        return Err(invalid());
    }

    let delta = match &captures["unit"] {
        "seconds" => TimeDelta::try_seconds(number),
        "minutes" => TimeDelta::try_minutes(number),
        "hours" => TimeDelta::try_hours(number),
        "days" => TimeDelta::try_days(number),
        "weeks" => TimeDelta::try_weeks(number),
        _ => None,
    };
    delta.ok_or_else(invalid)
}

/// Parse a `YYYY-MM-DDTHH:MM:SS` timestamp
pub fn parse_timestamp(timestamp: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(timestamp, PIPELINE_DATETIME_FORMAT)
        .map_err(|_| CoreError::InvalidTimestamp(timestamp.to_string()))
}

/// The current UTC time
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Advance `timestamp` by whole `period`s until it is not earlier than now
///
/// A timestamp already in the future is returned unchanged.
pub fn advance(timestamp: &str, period: &str) -> Result<String> {
    advance_from(timestamp, period, now())
}

/// Same as [`advance`], measured against an explicit `now`
pub fn advance_from(timestamp: &str, period: &str, now: NaiveDateTime) -> Result<String> {
    let start = parse_timestamp(timestamp)?;
    let delta = parse_period(period)?;

    if start >= now {
        return Ok(timestamp.to_string());
    }

    let overflow = || CoreError::InvalidTimestamp(timestamp.to_string());

    // Skip the whole periods in one step, then settle the remainder.
    let steps = (now - start).num_seconds() / delta.num_seconds();
    let skipped = delta
        .num_seconds()
        .checked_mul(steps)
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(overflow)?;
    let mut adjusted = start.checked_add_signed(skipped).ok_or_else(overflow)?;
    while adjusted < now {
        adjusted = adjusted.checked_add_signed(delta).ok_or_else(overflow)?;
    }

    tracing::debug!("Advanced start time {} to {}", timestamp, adjusted);

    Ok(adjusted.format(PIPELINE_DATETIME_FORMAT).to_string())
}
