//! Timezone-aware temporal types and the injectable clock
//!
//! Business rules in this system are keyed to calendar days in the program's
//! operating region (cash closures, cut days, due dates), while storage keeps
//! UTC instants. This module converts between the two through the tz database
//! rather than a fixed offset, and provides a `Clock` abstraction so that
//! date-sensitive logic and the cut scheduler can be tested with a frozen
//! clock instead of wall-clock sleeps.

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid period: start {start} must be before end {end}")]
    InvalidPeriod { start: String, end: String },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),
}

/// Timezone wrapper for the program's operating region
///
/// Wraps `chrono_tz::Tz` with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s)
            .map(Timezone)
            .map_err(|_| serde::de::Error::custom(format!("Invalid timezone: {}", s)))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Parses an IANA timezone name (e.g. `America/Mexico_City`)
    pub fn parse(name: &str) -> Result<Self, TemporalError> {
        Tz::from_str(name)
            .map(Timezone)
            .map_err(|_| TemporalError::InvalidTimezone(name.to_string()))
    }

    /// Returns the local calendar date for a UTC instant
    ///
    /// This is the date used for cash-closure uniqueness and cut-day
    /// matching: a registration at 01:00 UTC may still belong to the
    /// previous business day in the operating region.
    pub fn business_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.0).date_naive()
    }

    /// Gets the start of day (00:00:00) in this timezone as UTC
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        self.0
            .from_local_datetime(&date.and_hms_opt(0, 0, 0).expect("valid midnight"))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            // Midnight skipped by a DST jump: fall back to the UTC reading
            .unwrap_or_else(|| {
                Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("valid midnight"))
            })
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::UTC)
    }
}

/// Returns the same calendar day one month earlier, clamped to month length
///
/// Used to derive the scheduled cut window `[today - 1 month, today)`.
pub fn one_month_before(date: NaiveDate) -> NaiveDate {
    date.checked_sub_months(Months::new(1))
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(date.year(), 1, 1).expect("valid date"))
}

/// A source of the current time
///
/// Services take a `Clock` instead of calling `Utc::now()` directly so that
/// due-date and cut-day behavior can be exercised deterministically in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A controllable clock for tests
///
/// Starts at a fixed instant and only moves when `advance` or `set` is
/// called.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.lock().expect("clock poisoned");
        *now += duration;
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        let mut now = self.now.lock().expect("clock poisoned");
        *now = instant;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_business_date_crosses_midnight() {
        let tz = Timezone::parse("America/Mexico_City").unwrap();
        // 04:00 UTC is still the previous evening in central Mexico
        let at = Utc.with_ymd_and_hms(2026, 3, 10, 4, 0, 0).unwrap();
        assert_eq!(
            tz.business_date(at),
            NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
        );
    }

    #[test]
    fn test_start_of_day_roundtrip() {
        let tz = Timezone::parse("America/Mexico_City").unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
        let start = tz.start_of_day(date);
        assert_eq!(tz.business_date(start), date);
    }

    #[test]
    fn test_one_month_before_clamps() {
        assert_eq!(
            one_month_before(NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()),
            NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()
        );
        assert_eq!(
            one_month_before(NaiveDate::from_ymd_opt(2026, 7, 15).unwrap()),
            NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()
        );
    }

    #[test]
    fn test_fixed_clock_advances() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let clock = FixedClock::at(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::hours(30));
        assert_eq!(clock.now(), start + Duration::hours(30));
    }
}
