//! Event-time handling: the one textual timestamp format the store accepts, and
//! the numeric score a timestamp is indexed under.

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc};
use serde::Deserialize;

use super::types::{SnapshotError, SnapshotResult};

/// `YYYY-MM-DDTHH:MM:SS.ffffff`, no zone suffix, read as UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// How much of a timestamp survives into its index score.
///
/// `Seconds` truncates to whole seconds: snapshots inside the same second share a
/// score and come back in insertion order rather than true chronological order.
/// `Microseconds` keeps the full resolution of the stored timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorePrecision {
    #[default]
    Seconds,
    Microseconds,
}

impl std::str::FromStr for ScorePrecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "seconds" | "s" => Ok(ScorePrecision::Seconds),
            "microseconds" | "us" => Ok(ScorePrecision::Microseconds),
            other => Err(format!("unknown score precision {other:?}")),
        }
    }
}

pub fn parse_timestamp(raw: &str) -> SnapshotResult<DateTime<Utc>> {
    let malformed = || SnapshotError::MalformedTimestamp { raw: raw.to_string() };

    // chrono tolerates padding, signs and a missing fraction, so check the shape first
    let (head, fraction) = raw.split_once('.').ok_or_else(malformed)?;
    if !head_has_shape(head)
        || fraction.is_empty()
        || fraction.len() > 6
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(malformed());
    }

    NaiveDateTime::parse_from_str(raw, PARSE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| malformed())
}

// YYYY-MM-DDTHH:MM:SS, digits everywhere except the five separators
fn head_has_shape(head: &str) -> bool {
    const SEPARATORS: [(usize, u8); 5] = [(4, b'-'), (7, b'-'), (10, b'T'), (13, b':'), (16, b':')];
    head.len() == 19
        && head.bytes().enumerate().all(|(i, b)| match SEPARATORS.iter().find(|(at, _)| *at == i) {
            Some((_, sep)) => b == *sep,
            None => b.is_ascii_digit(),
        })
}

/// Whether `instant` can be written in the four-digit-year format and read back.
pub fn is_representable(instant: &DateTime<Utc>) -> bool {
    (0..=9999).contains(&instant.year())
}

pub fn format_timestamp(instant: &DateTime<Utc>) -> String {
    instant.format(TIMESTAMP_FORMAT).to_string()
}

pub fn to_score(instant: &DateTime<Utc>, precision: ScorePrecision) -> f64 {
    match precision {
        ScorePrecision::Seconds => instant.timestamp() as f64,
        ScorePrecision::Microseconds => instant.timestamp_micros() as f64 / 1_000_000.0,
    }
}

/// Drops anything finer than a microsecond; the record format cannot carry it.
pub fn truncate_to_micros(instant: DateTime<Utc>) -> DateTime<Utc> {
    let nanos = instant.nanosecond();
    instant.with_nanosecond(nanos - nanos % 1_000).unwrap_or(instant)
}

pub fn now() -> DateTime<Utc> {
    truncate_to_micros(Utc::now())
}
