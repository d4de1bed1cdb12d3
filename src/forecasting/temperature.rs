use super::model::{Sample, SeasonalModel};
use crate::error::{Result, SurfcastError};
use crate::models::{ForecastPoint, StationSeries};
use chrono::{Duration, NaiveDate};
use tracing::debug;

/// Water temperature forecast from the station's own history.
#[derive(Debug, Clone)]
pub struct TemperatureForecaster {
    model: SeasonalModel,
}

impl TemperatureForecaster {
    pub fn new(fourier_order: usize, interval_width: f64) -> Self {
        Self {
            model: SeasonalModel::yearly(fourier_order, interval_width),
        }
    }

    /// Forecast every calendar day from the first training date through the
    /// last training date plus `horizon_days`.
    ///
    /// Training uses observations strictly before `cutoff` that have a water
    /// temperature.
    pub fn forecast(
        &self,
        series: &StationSeries,
        cutoff: NaiveDate,
        horizon_days: u32,
    ) -> Result<Vec<ForecastPoint>> {
        let samples: Vec<Sample> = series
            .before(cutoff)
            .filter_map(|o| o.water_temp.map(|t| Sample::new(o.date, t)))
            .collect();

        let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
            return Err(SurfcastError::InsufficientData(format!(
                "{}: no water temperature observations before {}",
                series.station_id, cutoff
            )));
        };
        let (first, last) = (first.date, last.date);

        let fitted = self.model.fit(&samples)?;
        debug!(
            "{}: temperature model fit on {} days, residual sigma {:.3}",
            series.station_id,
            samples.len(),
            fitted.residual_sigma()
        );

        let end = last + Duration::days(i64::from(horizon_days));
        first
            .iter_days()
            .take_while(|d| *d <= end)
            .map(|date| {
                Ok(ForecastPoint {
                    date,
                    estimate: fitted.predict(date, &[])?,
                })
            })
            .collect()
    }
}
