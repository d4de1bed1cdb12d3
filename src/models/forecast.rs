use super::day_key::DayKey;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A point forecast with its uncertainty interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub point: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Estimate {
    pub fn new(point: f64, lower: f64, upper: f64) -> Self {
        Self {
            point,
            lower,
            upper,
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.lower <= self.point && self.point <= self.upper
    }
}

/// One day of a single variable's forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub estimate: Estimate,
}

impl ForecastPoint {
    pub fn day_key(&self) -> DayKey {
        DayKey::from_date(self.date)
    }
}

/// Combined wave-height and water-temperature forecast for one station day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub station_id: String,
    pub day_key: DayKey,
    pub wave_height: Estimate,
    pub water_temp: Estimate,
}

impl ForecastRecord {
    pub fn is_consistent(&self) -> bool {
        self.wave_height.is_ordered() && self.water_temp.is_ordered()
    }
}

/// A forecast record placed on an absolute calendar date.
#[derive(Debug, Clone, Copy)]
pub struct ForecastDay<'a> {
    pub date: NaiveDate,
    pub record: &'a ForecastRecord,
}

impl ForecastDay<'_> {
    pub fn station_id(&self) -> &str {
        &self.record.station_id
    }
}
