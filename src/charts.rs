//! SVG charts: the stored forecast for a recommended window, and held-out
//! evaluation plots written by the offline batch.

use crate::error::{Result, SurfcastError};
use crate::models::{ChartRef, Estimate, ForecastDay, ForecastPoint};
use chrono::{Duration, NaiveDate};
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

const CHART_SIZE: (u32, u32) = (800, 400);
const CHART_SUFFIX: &str = "_forecast.svg";

/// Produces chart files for a station's forecast over a date span.
pub trait ChartRenderer: Send + Sync {
    /// `days` are one station's forecast days in date order.
    fn render(&self, station_id: &str, days: &[ForecastDay<'_>]) -> Result<ChartRef>;

    /// Remove every generated chart. Returns the number of files removed.
    fn clear(&self) -> Result<usize>;
}

#[derive(Debug, Clone)]
pub struct SvgChartRenderer {
    chart_dir: PathBuf,
    url_prefix: String,
}

impl SvgChartRenderer {
    pub fn new(chart_dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            chart_dir: chart_dir.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn chart_dir(&self) -> &Path {
        &self.chart_dir
    }

    fn write(&self, file_name: &str, svg: &str) -> Result<String> {
        std::fs::create_dir_all(&self.chart_dir)?;
        let path = self.chart_dir.join(file_name);
        std::fs::write(&path, svg)?;
        debug!("Wrote chart {}", path.display());
        Ok(format!("{}/{}", self.url_prefix, file_name))
    }
}

/// Encode a station id as a file-name-safe stem.
///
/// ASCII alphanumerics and `_` pass through, `-` doubles, and every other
/// byte becomes `-xx` (lowercase hex), so distinct ids never share a stem.
fn file_stem(station_id: &str) -> String {
    let mut stem = String::with_capacity(station_id.len());
    for b in station_id.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' => stem.push(b as char),
            b'-' => stem.push_str("--"),
            _ => stem.push_str(&format!("-{:02x}", b)),
        }
    }
    stem
}

impl ChartRenderer for SvgChartRenderer {
    fn render(&self, station_id: &str, days: &[ForecastDay<'_>]) -> Result<ChartRef> {
        if days.is_empty() {
            return Err(SurfcastError::InsufficientData(format!(
                "{}: no forecast days to chart",
                station_id
            )));
        }
        // One chart pair per station and window start
        let stem = format!("{}_{}", file_stem(station_id), days[0].date.format("%Y%m%d"));

        let wave: Vec<(NaiveDate, Estimate)> =
            days.iter().map(|d| (d.date, d.record.wave_height)).collect();
        let temp: Vec<(NaiveDate, Estimate)> =
            days.iter().map(|d| (d.date, d.record.water_temp)).collect();

        let wvht_svg = draw_forecast(
            &format!("Wave height forecast - {}", station_id),
            "Wave height (m)",
            BLUE,
            &wave,
            &[],
        )?;
        let wtmp_svg = draw_forecast(
            &format!("Water temperature forecast - {}", station_id),
            "Water temperature (°C)",
            RED,
            &temp,
            &[],
        )?;

        Ok(ChartRef {
            location: station_id.to_string(),
            wvht: self.write(&format!("{}_wvht{}", stem, CHART_SUFFIX), &wvht_svg)?,
            wtmp: self.write(&format!("{}_wtmp{}", stem, CHART_SUFFIX), &wtmp_svg)?,
        })
    }

    fn clear(&self) -> Result<usize> {
        let entries = match std::fs::read_dir(&self.chart_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            let is_chart = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(CHART_SUFFIX))
                .unwrap_or(false);
            if is_chart && path.is_file() {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        debug!("Removed {} charts from {}", removed, self.chart_dir.display());
        Ok(removed)
    }
}

/// Observed values against the forecast over a station's held-out period.
#[derive(Debug, Clone)]
pub struct EvaluationPlotter {
    plots_dir: PathBuf,
}

impl EvaluationPlotter {
    pub fn new(plots_dir: impl Into<PathBuf>) -> Self {
        Self {
            plots_dir: plots_dir.into(),
        }
    }

    pub fn plots_dir(&self) -> &Path {
        &self.plots_dir
    }

    /// Write `{station}_{variable}.svg` and return its path. Forecast points
    /// outside the observed dates are left out.
    pub fn render(
        &self,
        station_id: &str,
        variable: &str,
        y_desc: &str,
        observed: &[(NaiveDate, f64)],
        forecast: &[ForecastPoint],
    ) -> Result<PathBuf> {
        let (Some(first), Some(last)) = (observed.first(), observed.last()) else {
            return Err(SurfcastError::InsufficientData(format!(
                "{}: no held-out {} observations to plot",
                station_id, variable
            )));
        };
        let points: Vec<(NaiveDate, Estimate)> = forecast
            .iter()
            .filter(|p| p.date >= first.0 && p.date <= last.0)
            .map(|p| (p.date, p.estimate))
            .collect();

        let svg = draw_forecast(
            &format!("{} actual vs predicted - {}", variable, station_id),
            y_desc,
            BLUE,
            &points,
            observed,
        )?;

        std::fs::create_dir_all(&self.plots_dir)?;
        let path = self
            .plots_dir
            .join(format!("{}_{}.svg", file_stem(station_id), variable));
        std::fs::write(&path, svg)?;
        debug!("Wrote evaluation plot {}", path.display());
        Ok(path)
    }
}

fn chart_error(e: impl std::fmt::Display) -> SurfcastError {
    SurfcastError::Chart(e.to_string())
}

/// Point forecast as a line over a shaded uncertainty band, with `observed`
/// values drawn on top when given.
fn draw_forecast(
    title: &str,
    y_desc: &str,
    color: RGBColor,
    points: &[(NaiveDate, Estimate)],
    observed: &[(NaiveDate, f64)],
) -> Result<String> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Err(SurfcastError::Chart("no points to draw".into()));
    };
    let start = observed.iter().map(|(d, _)| *d).fold(first.0, NaiveDate::min);
    let last = observed.iter().map(|(d, _)| *d).fold(last.0, NaiveDate::max);
    // A single-day window still needs a non-empty axis
    let end = if last > start {
        last
    } else {
        start + Duration::days(1)
    };

    let lo = points
        .iter()
        .map(|(_, e)| e.lower)
        .chain(observed.iter().map(|(_, v)| *v))
        .fold(f64::INFINITY, f64::min);
    let hi = points
        .iter()
        .map(|(_, e)| e.upper)
        .chain(observed.iter().map(|(_, v)| *v))
        .fold(f64::NEG_INFINITY, f64::max);
    let pad = ((hi - lo) * 0.1).max(0.1);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;

        let x_range: RangedDate<NaiveDate> = (start..end).into();
        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 20))
            .margin(20)
            .x_label_area_size(30)
            .y_label_area_size(50)
            .build_cartesian_2d(x_range, (lo - pad)..(hi + pad))
            .map_err(chart_error)?;

        chart
            .configure_mesh()
            .x_labels(7)
            .x_label_formatter(&|d: &NaiveDate| d.format("%m-%d").to_string())
            .y_desc(y_desc)
            .draw()
            .map_err(chart_error)?;

        let band: Vec<(NaiveDate, f64)> = points
            .iter()
            .map(|(d, e)| (*d, e.upper))
            .chain(points.iter().rev().map(|(d, e)| (*d, e.lower)))
            .collect();
        chart
            .draw_series(std::iter::once(Polygon::new(band, color.mix(0.2))))
            .map_err(chart_error)?
            .label("Uncertainty interval")
            .legend(move |(x, y)| {
                Rectangle::new([(x, y - 5), (x + 20, y + 5)], color.mix(0.2).filled())
            });

        chart
            .draw_series(LineSeries::new(
                points.iter().map(|(d, e)| (*d, e.point)),
                color.stroke_width(2),
            ))
            .map_err(chart_error)?
            .label("Forecast")
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));

        if !observed.is_empty() {
            chart
                .draw_series(LineSeries::new(observed.iter().copied(), BLACK.stroke_width(1)))
                .map_err(chart_error)?
                .label("Observed")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(chart_error)?;
        root.present().map_err(chart_error)?;
    }
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DayKey, ForecastRecord};

    fn record(d: NaiveDate) -> ForecastRecord {
        ForecastRecord {
            station_id: "46025_cleaned".into(),
            day_key: DayKey::from_date(d),
            wave_height: Estimate::new(1.2, 0.9, 1.5),
            water_temp: Estimate::new(17.0, 15.5, 18.5),
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("surfcast-charts-{}-{}", name, std::process::id()))
    }

    #[test]
    fn renders_both_charts() {
        let dir = temp_dir("render");
        let renderer = SvgChartRenderer::new(&dir, "/static/charts/");
        let d0 = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let records = vec![record(d0), record(d0 + Duration::days(1))];
        let days: Vec<ForecastDay<'_>> = records
            .iter()
            .enumerate()
            .map(|(i, r)| ForecastDay {
                date: d0 + Duration::days(i as i64),
                record: r,
            })
            .collect();

        let chart = renderer.render("46025_cleaned", &days).unwrap();
        assert_eq!(
            chart.wvht,
            "/static/charts/46025_cleaned_20250701_wvht_forecast.svg"
        );
        assert_eq!(
            chart.wtmp,
            "/static/charts/46025_cleaned_20250701_wtmp_forecast.svg"
        );

        let svg = std::fs::read_to_string(dir.join("46025_cleaned_20250701_wvht_forecast.svg"))
            .unwrap();
        assert!(svg.contains("<svg"));

        assert_eq!(renderer.clear().unwrap(), 2);
        assert_eq!(renderer.clear().unwrap(), 0);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn single_day_window_renders() {
        let dir = temp_dir("single");
        let renderer = SvgChartRenderer::new(&dir, "/static/charts");
        let d0 = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let r = record(d0);
        let days = vec![ForecastDay { date: d0, record: &r }];
        assert!(renderer.render("46025_cleaned", &days).is_ok());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn evaluation_plot_overlays_observations() {
        let dir = temp_dir("evaluation");
        let plotter = EvaluationPlotter::new(&dir);
        let d0 = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let forecast: Vec<ForecastPoint> = (0..20)
            .map(|i| ForecastPoint {
                date: d0 + Duration::days(i),
                estimate: Estimate::new(17.0, 16.0, 18.0),
            })
            .collect();
        let observed: Vec<(NaiveDate, f64)> = (0..10)
            .map(|i| (d0 + Duration::days(i), 16.5 + i as f64 * 0.1))
            .collect();

        let path = plotter
            .render("46025_cleaned", "WTMP", "Water temperature (°C)", &observed, &forecast)
            .unwrap();
        assert_eq!(path, dir.join("46025_cleaned_WTMP.svg"));
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("Observed"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn evaluation_plot_needs_observations() {
        let plotter = EvaluationPlotter::new(temp_dir("no-observed"));
        assert!(plotter.render("x", "WVHT", "m", &[], &[]).is_err());
    }

    #[test]
    fn empty_days_is_an_error() {
        let renderer = SvgChartRenderer::new(temp_dir("empty"), "/static/charts");
        assert!(renderer.render("x", &[]).is_err());
    }

    #[test]
    fn clear_on_missing_dir_is_noop() {
        let renderer = SvgChartRenderer::new(temp_dir("missing"), "/static/charts");
        assert_eq!(renderer.clear().unwrap(), 0);
    }

    #[test]
    fn station_ids_are_made_file_safe() {
        assert_eq!(file_stem("../etc/passwd"), "-2e-2e-2fetc-2fpasswd");
        assert_eq!(file_stem("46025_cleaned"), "46025_cleaned");
        assert_eq!(file_stem("a-b"), "a--b");
    }

    #[test]
    fn similar_station_ids_get_distinct_stems() {
        let ids = ["a.b", "a_b", "a-b", "a-2eb", "a b"];
        let stems: std::collections::HashSet<String> = ids.iter().map(|id| file_stem(id)).collect();
        assert_eq!(stems.len(), ids.len());
    }

    #[test]
    fn windows_of_one_station_get_separate_files() {
        let dir = temp_dir("windows");
        let renderer = SvgChartRenderer::new(&dir, "/static/charts");
        let d0 = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        let d1 = NaiveDate::from_ymd_opt(2025, 4, 5).unwrap();
        let r = record(d0);
        let first = renderer
            .render("S1", &[ForecastDay { date: d0, record: &r }])
            .unwrap();
        let second = renderer
            .render("S1", &[ForecastDay { date: d1, record: &r }])
            .unwrap();
        assert_ne!(first.wvht, second.wvht);
        assert_ne!(first.wtmp, second.wtmp);
        assert_eq!(renderer.clear().unwrap(), 4);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
