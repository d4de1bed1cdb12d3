use super::model::{Sample, SeasonalModel};
use crate::error::{Result, SurfcastError};
use crate::models::{DayKey, ForecastPoint, StationSeries};
use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Water temperature used as the wave model's explanatory variable.
///
/// Historical dates use the observed temperature; anything else falls back to
/// the temperature forecast for the same calendar day.
#[derive(Debug, Clone)]
pub struct TemperatureRegressor {
    cutoff: NaiveDate,
    observed: BTreeMap<NaiveDate, f64>,
    forecast: HashMap<DayKey, f64>,
}

impl TemperatureRegressor {
    pub fn new(series: &StationSeries, cutoff: NaiveDate, forecast: &[ForecastPoint]) -> Self {
        let observed = series
            .before(cutoff)
            .filter_map(|o| o.water_temp.map(|t| (o.date, t)))
            .collect();

        let mut by_key = HashMap::new();
        let mut ordered: Vec<&ForecastPoint> = forecast.iter().collect();
        ordered.sort_by_key(|p| p.date);
        // Latest date wins for a repeated day key
        for point in ordered {
            by_key.insert(point.day_key(), point.estimate.point);
        }

        Self {
            cutoff,
            observed,
            forecast: by_key,
        }
    }

    pub fn resolve(&self, date: NaiveDate) -> Option<f64> {
        if date < self.cutoff {
            if let Some(t) = self.observed.get(&date) {
                return Some(*t);
            }
        }
        self.forecast.get(&DayKey::from_date(date)).copied()
    }
}

/// Wave height forecast driven by water temperature.
#[derive(Debug, Clone)]
pub struct WaveHeightForecaster {
    model: SeasonalModel,
}

impl WaveHeightForecaster {
    pub fn new(fourier_order: usize, interval_width: f64) -> Self {
        Self {
            model: SeasonalModel::yearly(fourier_order, interval_width),
        }
    }

    /// Forecast from the first training date through the last training date
    /// plus `horizon_days`. Dates without a resolvable temperature are omitted.
    ///
    /// Training rows are observations before `cutoff` with both a wave height
    /// and an observed water temperature.
    pub fn forecast(
        &self,
        series: &StationSeries,
        cutoff: NaiveDate,
        horizon_days: u32,
        temperature: &[ForecastPoint],
    ) -> Result<Vec<ForecastPoint>> {
        let samples: Vec<Sample> = series
            .before(cutoff)
            .filter_map(|o| match (o.wave_height, o.water_temp) {
                (Some(h), Some(t)) => Some(Sample::new(o.date, h).with_regressor(t)),
                _ => None,
            })
            .collect();

        let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
            return Err(SurfcastError::InsufficientData(format!(
                "{}: no days with both wave height and water temperature before {}",
                series.station_id, cutoff
            )));
        };
        let (first, last) = (first.date, last.date);

        let fitted = self.model.fit(&samples)?;
        debug!(
            "{}: wave height model fit on {} days, residual sigma {:.3}",
            series.station_id,
            samples.len(),
            fitted.residual_sigma()
        );

        let regressor = TemperatureRegressor::new(series, cutoff, temperature);
        let end = last + Duration::days(i64::from(horizon_days));
        let mut points = Vec::new();
        let mut unresolved = 0usize;
        for date in first.iter_days().take_while(|d| *d <= end) {
            match regressor.resolve(date) {
                Some(t) => points.push(ForecastPoint {
                    date,
                    estimate: fitted.predict(date, &[t])?,
                }),
                None => unresolved += 1,
            }
        }
        if unresolved > 0 {
            debug!(
                "{}: {} forecast days had no water temperature and were dropped",
                series.station_id, unresolved
            );
        }
        Ok(points)
    }
}
