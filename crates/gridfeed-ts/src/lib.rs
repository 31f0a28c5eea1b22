//! Interval normalization for grid time series.
//!
//! Grid-operator APIs label each observation with a single period string
//! that marks the *end* of the interval. Everything downstream works with
//! half-open `[Interval Start, Interval End)` windows in UTC, so this crate
//! owns the parsing and the arithmetic between the two.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use gridfeed_core::{FeedError, FeedResult};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

pub const INTERVAL_START: &str = "Interval Start";
pub const INTERVAL_END: &str = "Interval End";

/// Timezone attached to every interval column.
pub const UTC_ZONE: &str = "UTC";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Reporting frequency understood by the EIA v2 API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    #[default]
    Hourly,
    LocalHourly,
    Daily,
}

impl Frequency {
    /// Value sent in the `frequency` request parameter.
    pub fn api_label(&self) -> &'static str {
        match self {
            Frequency::Hourly => "hourly",
            Frequency::LocalHourly => "local-hourly",
            Frequency::Daily => "daily",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Frequency::Hourly | Frequency::LocalHourly => Duration::hours(1),
            Frequency::Daily => Duration::days(1),
        }
    }
}

/// A caller-supplied point in time, possibly without a timezone.
///
/// Naive inputs are taken as UTC when resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Timestamp {
    Text(String),
    Date(NaiveDate),
    Naive(NaiveDateTime),
    Utc(DateTime<Utc>),
}

impl Timestamp {
    pub fn resolve(&self) -> FeedResult<DateTime<Utc>> {
        match self {
            Timestamp::Text(text) => parse_timestamp(text),
            Timestamp::Date(date) => date
                .and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive))
                .ok_or_else(|| FeedError::Parse(format!("invalid date {date}"))),
            Timestamp::Naive(naive) => Ok(Utc.from_utc_datetime(naive)),
            Timestamp::Utc(dt) => Ok(*dt),
        }
    }
}

impl From<&str> for Timestamp {
    fn from(text: &str) -> Self {
        Timestamp::Text(text.to_string())
    }
}

impl From<String> for Timestamp {
    fn from(text: String) -> Self {
        Timestamp::Text(text)
    }
}

impl From<NaiveDate> for Timestamp {
    fn from(date: NaiveDate) -> Self {
        Timestamp::Date(date)
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(naive: NaiveDateTime) -> Self {
        Timestamp::Naive(naive)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Timestamp {
    fn from(dt: DateTime<Tz>) -> Self {
        Timestamp::Utc(dt.with_timezone(&Utc))
    }
}

/// Parse a period label or user timestamp into UTC.
///
/// Accepts RFC 3339, the EIA hour labels `YYYY-MM-DDTHH` and
/// `YYYY-MM-DDTHH-05`, minute/second precision with `T` or space, and
/// bare dates. Values without an offset are UTC.
pub fn parse_timestamp(text: &str) -> FeedResult<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(FeedError::Parse("timestamp cannot be empty".to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Some(expanded) = expand_hour_label(trimmed) {
        return parse_timestamp(&expanded);
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| FeedError::Parse(format!("unrecognized timestamp '{trimmed}'")))
}

// Hour-precision labels carry no minutes, which chrono will not parse on
// their own: pad them out to a full time (and offset) first.
fn expand_hour_label(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    if !text.is_ascii() || bytes.len() < 13 || bytes[10] != b'T' {
        return None;
    }
    match bytes.len() {
        13 => Some(format!("{text}:00:00")),
        16 if matches!(bytes[13], b'+' | b'-') => {
            Some(format!("{}:00:00{}:00", &text[..13], &text[13..]))
        }
        _ => None,
    }
}

/// Render a timestamp the way the EIA `start`/`end` parameters expect.
pub fn format_api_hour(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H").to_string()
}

/// Parse a duration rule such as `"1h"`, `"15m"`, `"30s"` or `"1d"`.
///
/// A bare number is read as seconds.
pub fn parse_duration(rule: &str) -> FeedResult<Duration> {
    let trimmed = rule.trim();
    if trimmed.is_empty() {
        return Err(FeedError::Parse("duration rule cannot be empty".to_string()));
    }
    let (value_str, unit) = match trimmed.chars().last() {
        Some(ch) if ch.is_ascii_alphabetic() => (&trimmed[..trimmed.len() - 1], Some(ch)),
        _ => (trimmed, None),
    };

    let value = value_str
        .parse::<i64>()
        .map_err(|err| FeedError::Parse(format!("parsing duration '{trimmed}': {err}")))?;
    if value <= 0 {
        return Err(FeedError::Parse(format!(
            "duration '{trimmed}' must be positive"
        )));
    }
    let multiplier = match unit.unwrap_or('s') {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86_400,
        other => {
            return Err(FeedError::Parse(format!(
                "unsupported time unit '{other}'; expected s/m/h/d"
            )));
        }
    };
    Ok(Duration::seconds(value * multiplier))
}

/// Interval bounds for a period label that marks the end of the interval.
pub fn interval_bounds(
    label: &str,
    duration: Duration,
) -> FeedResult<(DateTime<Utc>, DateTime<Utc>)> {
    let end = parse_timestamp(label)?;
    Ok((end - duration, end))
}

/// [`interval_bounds`] expressed in another timezone.
pub fn interval_bounds_in<Tz: TimeZone>(
    label: &str,
    duration: Duration,
    tz: &Tz,
) -> FeedResult<(DateTime<Tz>, DateTime<Tz>)> {
    let (start, end) = interval_bounds(label, duration)?;
    Ok((start.with_timezone(tz), end.with_timezone(tz)))
}

/// Millisecond-precision UTC datetime series.
pub fn datetime_series(name: &str, millis: Vec<i64>) -> Series {
    Int64Chunked::from_vec(name, millis)
        .into_datetime(TimeUnit::Milliseconds, Some(UTC_ZONE.to_string()))
        .into_series()
}

/// Build the `Interval Start` / `Interval End` pair from period labels.
///
/// A null label is a parse failure; there is no sensible interval for it.
pub fn interval_columns<'a, I>(labels: I, duration: Duration) -> FeedResult<(Series, Series)>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut starts = Vec::new();
    let mut ends = Vec::new();
    for (row, label) in labels.into_iter().enumerate() {
        let label =
            label.ok_or_else(|| FeedError::Parse(format!("row {row}: missing period label")))?;
        let (start, end) = interval_bounds(label, duration)?;
        starts.push(start.timestamp_millis());
        ends.push(end.timestamp_millis());
    }
    Ok((
        datetime_series(INTERVAL_START, starts),
        datetime_series(INTERVAL_END, ends),
    ))
}
