//! Lenient timestamp parsing.
//!
//! Backend rows carry dates in several shapes: bare calendar dates from
//! date columns, RFC 3339 instants from timestamptz columns, and naive
//! `YYYY-MM-DD HH:MM:SS` text from hand-entered forms. Naive values are
//! taken as UTC. Anything unparseable yields `None` and sorts last.

use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Parse a raw text timestamp into an instant.
pub fn parse_instant(raw: &str) -> Option<OffsetDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(dt);
    }
    let naive = [
        PrimitiveDateTime::parse(
            s,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        ),
        PrimitiveDateTime::parse(
            s,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        ),
        PrimitiveDateTime::parse(
            s,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
        ),
        PrimitiveDateTime::parse(
            s,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
        ),
    ];
    if let Some(dt) = naive.into_iter().find_map(Result::ok) {
        return Some(dt.assume_utc());
    }
    parse_date(s).map(|d| d.midnight().assume_utc())
}

/// Parse a bare `YYYY-MM-DD` calendar date.
pub fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).ok()
}

/// Instant carried by a JSON column. Non-string values are malformed.
pub fn instant_of(value: &Value) -> Option<OffsetDateTime> {
    match value {
        Value::String(s) => parse_instant(s),
        _ => None,
    }
}

/// UTC calendar date carried by a JSON column.
pub fn date_of(value: &Value) -> Option<Date> {
    instant_of(value).map(|dt| dt.to_offset(UtcOffset::UTC).date())
}
