use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Wave heights at or above this value are buoy "no reading" markers.
pub const WAVE_HEIGHT_INVALID: f64 = 99.0;

/// Temperature value buoys report when the sensor has no reading.
pub const TEMPERATURE_MISSING: f64 = 999.0;

/// One cleaned day of buoy data. Sentinel readings are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub wave_height: Option<f64>,
    pub water_temp: Option<f64>,
    pub air_temp: Option<f64>,
}

impl Observation {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            wave_height: None,
            water_temp: None,
            air_temp: None,
        }
    }

    pub fn with_wave_height(mut self, meters: f64) -> Self {
        self.wave_height = valid_wave_height(meters);
        self
    }

    pub fn with_water_temp(mut self, celsius: f64) -> Self {
        self.water_temp = valid_temperature(celsius);
        self
    }

    pub fn with_air_temp(mut self, celsius: f64) -> Self {
        self.air_temp = valid_temperature(celsius);
        self
    }
}

pub fn valid_wave_height(meters: f64) -> Option<f64> {
    (meters.is_finite() && meters < WAVE_HEIGHT_INVALID).then_some(meters)
}

pub fn valid_temperature(celsius: f64) -> Option<f64> {
    (celsius.is_finite() && celsius < TEMPERATURE_MISSING).then_some(celsius)
}

/// All observations of one buoy station, sorted by date with one row per day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationSeries {
    pub station_id: String,
    pub observations: Vec<Observation>,
}

impl StationSeries {
    pub fn new(station_id: impl Into<String>, observations: Vec<Observation>) -> Self {
        Self {
            station_id: station_id.into(),
            observations,
        }
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    /// Observations strictly before `cutoff`.
    pub fn before(&self, cutoff: NaiveDate) -> impl Iterator<Item = &Observation> {
        self.observations.iter().filter(move |o| o.date < cutoff)
    }

    /// Observations on or after `start`.
    pub fn from_date(&self, start: NaiveDate) -> impl Iterator<Item = &Observation> {
        self.observations.iter().filter(move |o| o.date >= start)
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}
