use crate::error::{Result, SurfcastError};
use crate::models::DayKey;
use chrono::{Datelike, Duration, NaiveDate};

/// Longest range a single query may ask for.
pub const MAX_RANGE_DAYS: i64 = 3660;

/// A user-supplied date, with or without a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateInput {
    Absolute(NaiveDate),
    Yearless(DayKey),
}

impl DateInput {
    /// Accepts `YYYY-MM-DD` or `MM-DD`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(DateInput::Absolute(date));
        }
        DayKey::parse(s).map(DateInput::Yearless).map_err(|_| {
            SurfcastError::InputValidation(format!(
                "Invalid date '{}': use YYYY-MM-DD or MM-DD",
                s
            ))
        })
    }
}

/// Place a day key in `year`; Feb 29 falls back to Feb 28 in common years.
fn place(key: DayKey, year: i32) -> Result<NaiveDate> {
    key.in_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, key.month(), 28))
        .ok_or_else(|| SurfcastError::InputValidation(format!("Date out of range: {}", key)))
}

/// An inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(SurfcastError::InputValidation(
                "Start date must not be after end date".into(),
            ));
        }
        if (end - start).num_days() > MAX_RANGE_DAYS {
            return Err(SurfcastError::InputValidation(format!(
                "Date range must not exceed {} days",
                MAX_RANGE_DAYS
            )));
        }
        Ok(Self { start, end })
    }

    /// Resolve raw start/end inputs into absolute dates.
    ///
    /// Year-less inputs take their year from the other bound when it is
    /// absolute, otherwise from `today` (rolling forward a year if that range
    /// has already ended). An end day that precedes the start day wraps into
    /// the following year.
    pub fn resolve(start: &str, end: &str, today: NaiveDate) -> Result<Self> {
        let (start, end) = match (DateInput::parse(start)?, DateInput::parse(end)?) {
            (DateInput::Absolute(s), DateInput::Absolute(e)) => (s, e),
            (DateInput::Absolute(s), DateInput::Yearless(e)) => {
                let mut end = place(e, s.year())?;
                if end < s {
                    end = place(e, s.year() + 1)?;
                }
                (s, end)
            }
            (DateInput::Yearless(s), DateInput::Absolute(e)) => {
                let mut start = place(s, e.year())?;
                if start > e {
                    start = place(s, e.year() - 1)?;
                }
                (start, e)
            }
            (DateInput::Yearless(s), DateInput::Yearless(e)) => {
                let wraps = e < s;
                let mut year = today.year();
                let project = |year: i32| -> Result<(NaiveDate, NaiveDate)> {
                    let end_year = if wraps { year + 1 } else { year };
                    Ok((place(s, year)?, place(e, end_year)?))
                };
                let (mut start, mut end) = project(year)?;
                if end < today {
                    year += 1;
                    (start, end) = project(year)?;
                }
                (start, end)
            }
        };
        Self::new(start, end)
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// The part of this range on or after `date`, if any.
    pub fn from_date(&self, date: NaiveDate) -> Option<Self> {
        (self.end >= date).then(|| Self {
            start: self.start.max(date),
            end: self.end,
        })
    }

    /// The `days` days after this range, starting no earlier than `not_before`.
    pub fn following(&self, not_before: NaiveDate, days: u32) -> Self {
        let start = (self.end + Duration::days(1)).max(not_before);
        let end = start + Duration::days(i64::from(days.max(1)) - 1);
        Self { start, end }
    }
}
