//! Calendar-date range filter applied before any metric is counted.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::Date;

use crm_core::timestamp;
use crm_core::Interaction;

use crate::error::RollupError;

/// A `YYYY-MM-DD` date that serializes as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate(pub Date);

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl std::str::FromStr for CalendarDate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        timestamp::parse_date(s)
            .map(CalendarDate)
            .ok_or_else(|| format!("expected a YYYY-MM-DD date, got '{}'", s))
    }
}

impl Serialize for CalendarDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CalendarDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl From<Date> for CalendarDate {
    fn from(d: Date) -> Self {
        CalendarDate(d)
    }
}

fn default_date_field() -> String {
    "occurred_on".to_string()
}

/// Keep only entities whose latest Interaction's `field` falls in
/// `[from, to]`, both ends inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFilter {
    pub from: CalendarDate,
    pub to: CalendarDate,
    /// Interaction column holding the date. Defaults to `occurred_on`.
    #[serde(default = "default_date_field")]
    pub field: String,
}

impl DateFilter {
    pub fn new(from: Date, to: Date) -> Self {
        DateFilter {
            from: CalendarDate(from),
            to: CalendarDate(to),
            field: default_date_field(),
        }
    }

    pub fn on_field(mut self, field: &str) -> Self {
        self.field = field.to_string();
        self
    }

    pub fn validate(&self) -> Result<(), RollupError> {
        if self.from > self.to {
            return Err(RollupError::InvalidDateRange {
                from: self.from.to_string(),
                to: self.to.to_string(),
            });
        }
        Ok(())
    }

    /// No Interaction, or a null/malformed date, fails the filter.
    pub fn admits(&self, latest: Option<&Interaction>) -> bool {
        latest
            .and_then(|i| i.field(&self.field))
            .and_then(timestamp::date_of)
            .is_some_and(|d| self.from.0 <= d && d <= self.to.0)
    }
}
