use crate::error::{Result, SurfcastError};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Year-independent calendar day.
///
/// Keys live in a leap reference year so that every calendar date, Feb 29
/// included, has exactly one key and keys order like day-of-year ordinals
/// (Jan 1 = 1, Feb 29 = 60, Mar 1 = 61, Dec 31 = 366).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayKey(NaiveDate);

const REFERENCE_LEAP_YEAR: i32 = 2000;

impl DayKey {
    pub fn from_md(month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(REFERENCE_LEAP_YEAR, month, day).map(DayKey)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        // Every real month/day exists in the leap reference year.
        Self::from_md(date.month(), date.day()).unwrap_or(DayKey(date))
    }

    /// Parse the persisted `MM-DD` form.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || SurfcastError::InputValidation(format!("Invalid day key '{}'", s));
        let (month, day) = s.trim().split_once('-').ok_or_else(invalid)?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        let day: u32 = day.parse().map_err(|_| invalid())?;
        Self::from_md(month, day).ok_or_else(invalid)
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// Day-of-year ordinal in the leap reference calendar (1..=366).
    pub fn ordinal(&self) -> u32 {
        self.0.ordinal()
    }

    pub fn is_leap_day(&self) -> bool {
        self.month() == 2 && self.day() == 29
    }

    /// The date this key falls on in `year`; `None` for Feb 29 in a common year.
    pub fn in_year(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month(), self.day())
    }
}

impl std::fmt::Display for DayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}-{:02}", self.month(), self.day())
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde::de::Error;
        let value = String::deserialize(deserializer)?;
        DayKey::parse(&value).map_err(D::Error::custom)
    }
}
