use super::model::mean_absolute_error;
use super::temperature::TemperatureForecaster;
use super::wave_height::WaveHeightForecaster;
use crate::charts::EvaluationPlotter;
use crate::config::ForecastingConfig;
use crate::datasources::{load_station, station_id_from_path, ForecastCsvWriter, StationDataset};
use crate::error::Result;
use crate::models::{DayKey, Estimate, ForecastPoint, ForecastRecord, StationSeries};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

/// Held-out accuracy for one station.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evaluation {
    pub wave_height_mae: Option<f64>,
    pub water_temp_mae: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct StationForecast {
    pub station_id: String,
    pub records: Vec<ForecastRecord>,
    pub evaluation: Evaluation,
    pub plots: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationOutcome {
    pub station_id: String,
    pub records: usize,
    pub evaluation: Evaluation,
    pub plots: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedStation {
    pub station_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub written: Vec<StationOutcome>,
    pub skipped: Vec<SkippedStation>,
}

impl BatchSummary {
    pub fn total_records(&self) -> usize {
        self.written.iter().map(|s| s.records).sum()
    }
}

/// Offline batch: fit both models per station and emit combined forecast records.
#[derive(Debug, Clone)]
pub struct ForecastPipeline {
    config: ForecastingConfig,
    temperature: TemperatureForecaster,
    wave_height: WaveHeightForecaster,
    plotter: Option<EvaluationPlotter>,
}

impl ForecastPipeline {
    pub fn new(config: &ForecastingConfig) -> Self {
        Self {
            config: config.clone(),
            temperature: TemperatureForecaster::new(
                config.fourier_order,
                config.temperature_interval,
            ),
            wave_height: WaveHeightForecaster::new(
                config.fourier_order,
                config.wave_height_interval,
            ),
            plotter: None,
        }
    }

    /// Also plot each station's held-out observations against its forecast.
    pub fn with_evaluation_plots(mut self, plotter: EvaluationPlotter) -> Self {
        self.plotter = Some(plotter);
        self
    }

    /// Days to forecast past the last training date: enough to cover every
    /// held-out observation, and never less than `min_horizon_days`.
    pub fn horizon_days(&self, series: &StationSeries) -> u32 {
        let last_train = series.before(self.config.train_cutoff).map(|o| o.date).max();
        let observed_gap = match (last_train, series.last_date()) {
            (Some(train), Some(last)) => (last - train).num_days().max(0),
            _ => 0,
        };
        u32::try_from(observed_gap)
            .unwrap_or(u32::MAX)
            .max(self.config.min_horizon_days)
    }

    pub fn forecast_station(&self, series: &StationSeries) -> Result<StationForecast> {
        let cutoff = self.config.train_cutoff;
        let horizon = self.horizon_days(series);

        let temperature = self.temperature.forecast(series, cutoff, horizon)?;
        let wave_height = self
            .wave_height
            .forecast(series, cutoff, horizon, &temperature)?;

        let records = self.join(&series.station_id, &wave_height, &temperature);
        let evaluation = self.evaluate(series, &wave_height, &temperature);
        let plots = self.plot_evaluation(series, &wave_height, &temperature);

        Ok(StationForecast {
            station_id: series.station_id.clone(),
            records,
            evaluation,
            plots,
        })
    }

    /// Combine both forecasts on day key, keeping dates from `forecast_start`.
    /// When a day key occurs in several years the latest date wins.
    fn join(
        &self,
        station_id: &str,
        wave_height: &[ForecastPoint],
        temperature: &[ForecastPoint],
    ) -> Vec<ForecastRecord> {
        let start = self.config.forecast_start;
        let temperature_by_key = latest_by_key(temperature, start);
        latest_by_key(wave_height, start)
            .into_iter()
            .filter_map(|(day_key, wave)| {
                temperature_by_key.get(&day_key).map(|temp| ForecastRecord {
                    station_id: station_id.to_string(),
                    day_key,
                    wave_height: wave,
                    water_temp: *temp,
                })
            })
            .collect()
    }

    fn evaluate(
        &self,
        series: &StationSeries,
        wave_height: &[ForecastPoint],
        temperature: &[ForecastPoint],
    ) -> Evaluation {
        let by_date = |points: &[ForecastPoint]| -> HashMap<NaiveDate, f64> {
            points.iter().map(|p| (p.date, p.estimate.point)).collect()
        };
        let wave = by_date(wave_height);
        let temp = by_date(temperature);
        let held_out: Vec<_> = series.from_date(self.config.forecast_start).collect();

        let evaluation = Evaluation {
            wave_height_mae: mean_absolute_error(held_out.iter().filter_map(|o| {
                Some((o.wave_height?, *wave.get(&o.date)?))
            })),
            water_temp_mae: mean_absolute_error(
                held_out
                    .iter()
                    .filter_map(|o| Some((o.water_temp?, *temp.get(&o.date)?))),
            ),
        };
        if let Some(mae) = evaluation.wave_height_mae {
            info!("{}: wave height MAE on held-out data {:.3} m", series.station_id, mae);
        }
        if let Some(mae) = evaluation.water_temp_mae {
            info!(
                "{}: water temperature MAE on held-out data {:.3} °C",
                series.station_id, mae
            );
        }
        evaluation
    }

    /// Plot held-out observations against each forecast. Failures are logged
    /// and leave that plot out.
    fn plot_evaluation(
        &self,
        series: &StationSeries,
        wave_height: &[ForecastPoint],
        temperature: &[ForecastPoint],
    ) -> Vec<PathBuf> {
        let Some(plotter) = &self.plotter else {
            return Vec::new();
        };
        let held_out: Vec<_> = series.from_date(self.config.forecast_start).collect();
        let wave: Vec<(NaiveDate, f64)> = held_out
            .iter()
            .filter_map(|o| Some((o.date, o.wave_height?)))
            .collect();
        let temp: Vec<(NaiveDate, f64)> = held_out
            .iter()
            .filter_map(|o| Some((o.date, o.water_temp?)))
            .collect();

        [
            ("WVHT", "Wave height (m)", wave, wave_height),
            ("WTMP", "Water temperature (°C)", temp, temperature),
        ]
        .into_iter()
        .filter(|(_, _, observed, _)| !observed.is_empty())
        .filter_map(|(variable, y_desc, observed, forecast)| {
            match plotter.render(&series.station_id, variable, y_desc, &observed, forecast) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("{}: {} evaluation plot failed: {}", series.station_id, variable, e);
                    None
                }
            }
        })
        .collect()
    }

    /// Process every station in `dataset`, handing each successful forecast to
    /// `sink`. Stations whose data cannot be read or fit are skipped and
    /// reported in the summary; any other error, including one from `sink`,
    /// aborts the batch.
    pub fn run_with<F>(&self, dataset: &StationDataset, mut sink: F) -> Result<BatchSummary>
    where
        F: FnMut(&StationForecast) -> Result<()>,
    {
        let mut summary = BatchSummary::default();
        for path in &dataset.files {
            let station_id = station_id_from_path(path);
            info!("Forecasting station {}", station_id);

            let forecast = match load_station(path).and_then(|s| self.forecast_station(&s)) {
                Ok(forecast) => forecast,
                Err(e) if !e.is_recoverable() => return Err(e),
                Err(e) => {
                    warn!("Skipping {}: {}", station_id, e);
                    summary.skipped.push(SkippedStation {
                        station_id,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            sink(&forecast)?;
            summary.written.push(StationOutcome {
                station_id: forecast.station_id.clone(),
                records: forecast.records.len(),
                evaluation: forecast.evaluation.clone(),
                plots: forecast.plots.clone(),
            });
        }

        info!(
            "Forecast batch complete: {} stations written ({} records), {} skipped",
            summary.written.len(),
            summary.total_records(),
            summary.skipped.len()
        );
        Ok(summary)
    }

    /// Process every station and append its records to `writer`.
    pub fn run<W: Write>(
        &self,
        dataset: &StationDataset,
        writer: &mut ForecastCsvWriter<W>,
    ) -> Result<BatchSummary> {
        self.run_with(dataset, |forecast| {
            writer.append_station(&forecast.records)?;
            Ok(())
        })
    }
}

fn latest_by_key(points: &[ForecastPoint], start: NaiveDate) -> BTreeMap<DayKey, Estimate> {
    let mut ordered: Vec<&ForecastPoint> = points.iter().filter(|p| p.date >= start).collect();
    ordered.sort_by_key(|p| p.date);
    ordered
        .into_iter()
        .map(|p| (p.day_key(), p.estimate))
        .collect()
}
