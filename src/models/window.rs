use super::forecast::{Estimate, ForecastDay};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowDay {
    pub date: NaiveDate,
    pub wave_height: Estimate,
    pub water_temp: Estimate,
}

/// N consecutive forecast days at one station, scored against a target wave height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VacationWindow {
    pub station_id: String,
    pub days: Vec<WindowDay>,
    /// Sum of |forecast wave height - target| over the window; lower is better.
    pub score: f64,
}

impl VacationWindow {
    pub fn from_days(days: &[ForecastDay<'_>], score: f64) -> Self {
        let station_id = days
            .first()
            .map(|d| d.station_id().to_string())
            .unwrap_or_default();
        Self {
            station_id,
            days: days
                .iter()
                .map(|d| WindowDay {
                    date: d.date,
                    wave_height: d.record.wave_height,
                    water_temp: d.record.water_temp,
                })
                .collect(),
            score,
        }
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.days.first().map(|d| d.date)
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.days.last().map(|d| d.date)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn mean_water_temp(&self) -> Option<f64> {
        mean(self.days.iter().map(|d| d.water_temp.point))
    }

    pub fn mean_wave_height(&self) -> Option<f64> {
        mean(self.days.iter().map(|d| d.wave_height.point))
    }

    /// Station ids may carry a suffix after `_` (e.g. `46025_2023`); users see the prefix.
    pub fn display_name(&self) -> &str {
        self.station_id
            .split('_')
            .next()
            .unwrap_or(&self.station_id)
    }

    /// One human-readable line per day.
    pub fn describe_days(&self) -> Vec<String> {
        self.days
            .iter()
            .map(|d| {
                format!(
                    "{} - {}, Wave height: {:.2}m, Water Temp: {:.2}°C",
                    d.date.format("%Y-%m-%d"),
                    self.display_name(),
                    d.wave_height.point,
                    d.water_temp.point
                )
            })
            .collect()
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
