use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};

/// A calendar date with no time-of-day significance.
///
/// Internally pinned to 12:00:00 UTC so that day arithmetic and
/// comparisons never cross a day boundary through a time-of-day
/// component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateSpec(DateTime<Utc>);

impl DateSpec {
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        let midnight = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
        Self(midnight + Duration::hours(12))
    }

    /// The pinned noon instant backing this date.
    #[must_use]
    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }
}

impl fmt::Display for DateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date().format("%Y-%m-%d"))
    }
}

impl Serialize for DateSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// One enumerated day of the configured span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub is_past: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    InvalidRange { start: NaiveDate, end: NaiveDate },
    InvalidTimeZone(String),
}

impl fmt::Display for CalendarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRange { start, end } => {
                write!(f, "end date {end} precedes start date {start}")
            }
            Self::InvalidTimeZone(zone) => write!(f, "unknown IANA time zone: {zone}"),
        }
    }
}

impl std::error::Error for CalendarError {}

/// Looks a zone identifier up in the bundled IANA database.
pub fn resolve_zone(zone: &str) -> Result<Tz, CalendarError> {
    zone.trim()
        .parse::<Tz>()
        .map_err(|_| CalendarError::InvalidTimeZone(zone.to_string()))
}

/// Number of days in the inclusive span `start..=end`. Equals 1 when
/// both ends name the same date; negative when the span is inverted.
#[must_use]
pub fn count_days_inclusive(start: DateSpec, end: DateSpec) -> i64 {
    (end.instant() - start.instant()).num_days() + 1
}

/// Enumerates every day of the inclusive span, flagging each one past
/// or not relative to the calendar date of `now` as observed in
/// `zone`. A day equal to today is not past.
///
/// `now` is always an explicit input; this function never reads a
/// clock and is deterministic for identical arguments.
pub fn enumerate_days(
    start: DateSpec,
    end: DateSpec,
    zone: &str,
    now: DateTime<Utc>,
) -> Result<Vec<DayRecord>, CalendarError> {
    if end < start {
        return Err(CalendarError::InvalidRange {
            start: start.date(),
            end: end.date(),
        });
    }

    let tz = resolve_zone(zone)?;
    let today = now.with_timezone(&tz).date_naive();

    let count = count_days_inclusive(start, end);
    let mut days = Vec::with_capacity(count as usize);
    for i in 0..count {
        let date = (start.instant() + Duration::days(i)).date_naive();
        days.push(DayRecord {
            date,
            is_past: date < today,
        });
    }

    Ok(days)
}
