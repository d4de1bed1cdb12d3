use super::dates::DateRange;
use super::ranking::WindowRanker;
use crate::charts::ChartRenderer;
use crate::config::Config;
use crate::datasources::{ForecastStore, ForecastStoreHandle};
use crate::error::{ErrorClass, SurfcastError};
use crate::models::{
    ChartRef, NumberOrText, Outfit, RecommendationRequest, RecommendationResponse, ServiceError,
    VacationWindow,
};
use chrono::{Local, NaiveDate};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const MSG_NO_MATCHES: &str = "No suitable vacation windows found.";
pub const MSG_NO_DATA: &str = "No forecast data is available yet.";
pub const MSG_FALLBACK: &str =
    "No forecasts matched your dates. Here are the closest alternatives after your trip:";
const MSG_UNEXPECTED: &str = "An unexpected error occurred. Please try again later.";
const MSG_BAD_WAVE_HEIGHT: &str = "Wave height must be a non-negative number.";
const MSG_BAD_NUM_DAYS: &str = "Number of days must be a positive whole number.";
const MSG_MISSING_DATES: &str = "Start date and end date must be provided.";

/// Upper bound on the requested window length.
pub const MAX_WINDOW_DAYS: usize = 366;

/// A validated vacation-window query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Query {
    pub wave_height: f64,
    pub num_days: NonZeroUsize,
    pub range: DateRange,
}

impl Query {
    pub fn from_request(
        request: &RecommendationRequest,
        today: NaiveDate,
    ) -> Result<Self, SurfcastError> {
        let invalid = |msg: &str| SurfcastError::InputValidation(msg.to_string());

        let wave_height = request
            .wave_height
            .as_ref()
            .and_then(NumberOrText::as_f64)
            .filter(|h| *h >= 0.0)
            .ok_or_else(|| invalid(MSG_BAD_WAVE_HEIGHT))?;

        let num_days = request
            .num_days
            .as_ref()
            .and_then(NumberOrText::as_f64)
            .filter(|n| n.fract() == 0.0 && *n >= 1.0 && *n <= MAX_WINDOW_DAYS as f64)
            .and_then(|n| NonZeroUsize::new(n as usize))
            .ok_or_else(|| invalid(MSG_BAD_NUM_DAYS))?;

        let non_blank = |s: &Option<String>| s.clone().filter(|v| !v.trim().is_empty());
        let (Some(start), Some(end)) = (non_blank(&request.start_date), non_blank(&request.end_date))
        else {
            return Err(invalid(MSG_MISSING_DATES));
        };
        let range = DateRange::resolve(&start, &end, today)?;

        Ok(Self {
            wave_height,
            num_days,
            range,
        })
    }
}

/// Answers vacation-window queries from the precomputed forecast store.
pub struct RecommendationService {
    store: ForecastStoreHandle,
    charts: Option<Arc<dyn ChartRenderer>>,
    ranker: WindowRanker,
    fallback_ranker: WindowRanker,
    fallback_lookahead_days: u32,
}

impl RecommendationService {
    pub fn new(store: ForecastStoreHandle, charts: Arc<dyn ChartRenderer>, config: &Config) -> Self {
        Self::build(store, Some(charts), config)
    }

    /// A service that answers queries without producing charts.
    pub fn without_charts(store: ForecastStoreHandle, config: &Config) -> Self {
        Self::build(store, None, config)
    }

    fn build(
        store: ForecastStoreHandle,
        charts: Option<Arc<dyn ChartRenderer>>,
        config: &Config,
    ) -> Self {
        let ranking = &config.ranking;
        Self {
            store,
            charts,
            ranker: WindowRanker::new(ranking.top_k, true),
            fallback_ranker: WindowRanker::new(ranking.top_k, ranking.fallback_distinct_stations),
            fallback_lookahead_days: ranking.fallback_lookahead_days,
        }
    }

    pub fn store(&self) -> &ForecastStoreHandle {
        &self.store
    }

    pub fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> Result<RecommendationResponse, ServiceError> {
        self.recommend_on(request, Local::now().date_naive())
    }

    /// Like [`recommend`](Self::recommend), resolving year-less dates against `today`.
    pub fn recommend_on(
        &self,
        request: &RecommendationRequest,
        today: NaiveDate,
    ) -> Result<RecommendationResponse, ServiceError> {
        let query = Query::from_request(request, today).map_err(to_service_error)?;
        debug!(
            "Query: wave height {:.2}m, {} days, {} to {}",
            query.wave_height, query.num_days, query.range.start, query.range.end
        );

        let store = self.store.snapshot();
        if store.is_empty() {
            warn!("Recommendation requested but the forecast store is empty");
            return Ok(RecommendationResponse::no_matches(MSG_NO_DATA));
        }

        let (windows, fallback) = self.find_windows(&store, &query, today);
        if windows.is_empty() {
            return Ok(RecommendationResponse::no_matches(MSG_NO_MATCHES));
        }
        info!(
            "Found {} windows{}",
            windows.len(),
            if fallback { " after the requested range" } else { "" }
        );

        let graphs = self.render_charts(&store, &windows);
        let outfit_suggestion = windows[0]
            .mean_water_temp()
            .map(Outfit::suggestion_for)
            .unwrap_or_else(|| "No outfit suggestion available.".into());
        let message = if fallback {
            MSG_FALLBACK.to_string()
        } else {
            format!("Here are the top {} vacation windows:", windows.len())
        };
        let html = windows
            .iter()
            .map(|w| w.describe_days().join("<br>"))
            .collect::<Vec<_>>()
            .join("<br><br>");

        Ok(RecommendationResponse {
            message,
            html,
            windows,
            outfit_suggestion,
            graphs,
            fallback,
        })
    }

    /// Rank within the part of the requested range that has not passed yet, or
    /// in the period after it when that part has no candidates at all.
    fn find_windows(
        &self,
        store: &ForecastStore,
        query: &Query,
        today: NaiveDate,
    ) -> (Vec<VacationWindow>, bool) {
        if let Some(upcoming) = query.range.from_date(today) {
            let days = store.project(upcoming.start, upcoming.end);
            let windows = self.ranker.rank(&days, query.wave_height, query.num_days);
            if !windows.is_empty() {
                return (windows, false);
            }
        }

        let after = query.range.following(today, self.fallback_lookahead_days);
        debug!(
            "No windows in {}..={}, searching {}..={}",
            query.range.start, query.range.end, after.start, after.end
        );
        let days = store.project(after.start, after.end);
        let windows = self
            .fallback_ranker
            .rank(&days, query.wave_height, query.num_days);
        let fallback = !windows.is_empty();
        (windows, fallback)
    }

    /// Charts for each window from stored records. A failed chart is logged and left out.
    fn render_charts(&self, store: &ForecastStore, windows: &[VacationWindow]) -> Vec<ChartRef> {
        let Some(charts) = &self.charts else {
            return Vec::new();
        };
        windows
            .iter()
            .filter_map(|w| {
                let (start, end) = (w.start()?, w.end()?);
                let days = store.project_station(&w.station_id, start, end);
                match charts.render(&w.station_id, &days) {
                    Ok(chart) => Some(chart),
                    Err(e) => {
                        warn!("Chart generation failed for {}: {}", w.station_id, e);
                        None
                    }
                }
            })
            .collect()
    }

    /// Remove generated charts. Returns the number of files removed.
    pub fn clear_charts(&self) -> Result<usize, ServiceError> {
        let Some(charts) = &self.charts else {
            return Ok(0);
        };
        let removed = charts.clear().map_err(to_service_error)?;
        info!("Cleared {} chart files", removed);
        Ok(removed)
    }

    /// Swap in a freshly read forecast store. Returns the new record count.
    pub fn reload(&self) -> Result<usize, ServiceError> {
        let count = self.store.reload().map_err(to_service_error)?;
        if let Some(path) = self.store.path() {
            info!("Forecast store reloaded from {} with {} records", path.display(), count);
        }
        Ok(count)
    }
}

/// Map an internal error to what a caller may see; details stay in the log.
fn to_service_error(err: SurfcastError) -> ServiceError {
    match err.class() {
        ErrorClass::InputValidation => {
            debug!("Rejected request: {}", err);
            let message = match &err {
                SurfcastError::InputValidation(msg) => msg.clone(),
                _ => "The forecast data is missing required columns.".to_string(),
            };
            ServiceError::new(ErrorClass::InputValidation, message)
        }
        ErrorClass::Unexpected => {
            error!("Recommendation service error: {}", err);
            ServiceError::new(ErrorClass::Unexpected, MSG_UNEXPECTED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::SvgChartRenderer;
    use crate::error::Result;
    use crate::models::{DayKey, Estimate, ForecastDay, ForecastRecord};
    use std::path::PathBuf;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(station: &str, m: u32, d: u32, wvht: f64, wtmp: f64) -> ForecastRecord {
        ForecastRecord {
            station_id: station.into(),
            day_key: DayKey::from_md(m, d).unwrap(),
            wave_height: Estimate::new(wvht, wvht - 0.3, wvht + 0.3),
            water_temp: Estimate::new(wtmp, wtmp - 1.0, wtmp + 1.0),
        }
    }

    /// Charts are recorded in memory; a station named "broken" fails.
    struct RecordingCharts;

    impl ChartRenderer for RecordingCharts {
        fn render(&self, station_id: &str, days: &[ForecastDay<'_>]) -> Result<ChartRef> {
            if station_id == "broken" {
                return Err(SurfcastError::Chart("boom".into()));
            }
            Ok(ChartRef {
                location: station_id.into(),
                wvht: format!("/static/charts/{}_wvht_forecast.svg", station_id),
                wtmp: format!("/static/charts/{}_wtmp_{}.svg", station_id, days.len()),
            })
        }

        fn clear(&self) -> Result<usize> {
            Ok(0)
        }
    }

    fn service(records: Vec<ForecastRecord>) -> RecommendationService {
        RecommendationService::new(
            ForecastStoreHandle::new(ForecastStore::from_records(records)),
            Arc::new(RecordingCharts),
            &Config::default(),
        )
    }

    fn march_store() -> Vec<ForecastRecord> {
        let mut records = Vec::new();
        for d in 1..=31 {
            let wvht = if d == 10 || d == 11 { 1.0 } else { 1.8 };
            records.push(record("S1", 3, d, wvht, 16.0));
            records.push(record("S2_cleaned", 3, d, 1.4, 21.0));
        }
        records
    }

    #[test]
    fn returns_ranked_windows_with_outfit() {
        let svc = service(march_store());
        let request = RecommendationRequest::new(1.0, 2, "2025-03-01", "2025-03-31");
        let response = svc.recommend_on(&request, date(2025, 1, 1)).unwrap();

        assert!(!response.fallback);
        assert_eq!(response.message, "Here are the top 2 vacation windows:");
        assert_eq!(response.windows.len(), 2);
        let best = response.best_window().unwrap();
        assert_eq!(best.station_id, "S1");
        assert_eq!(best.start(), Some(date(2025, 3, 10)));
        assert!(best.score.abs() < 1e-12);
        assert_eq!(
            response.outfit_suggestion,
            "For an average water temperature of 16.00°C: A 3/2mm wetsuit is ideal."
        );
        assert!(response.html.starts_with(
            "2025-03-10 - S1, Wave height: 1.00m, Water Temp: 16.00°C<br>2025-03-11 - S1"
        ));
        assert!(response.html.contains("<br><br>2025-03-01 - S2, Wave height: 1.40m"));
        assert_eq!(response.graphs.len(), 2);
        assert_eq!(response.graphs[0].wtmp, "/static/charts/S1_wtmp_2.svg");
    }

    #[test]
    fn empty_range_falls_back_to_later_dates() {
        let records: Vec<ForecastRecord> = (1..=30)
            .map(|d| record("S1", 4, d, 1.0 + d as f64 / 100.0, 14.0))
            .chain((1..=30).map(|d| record("S2", 4, d, 2.0, 14.0)))
            .collect();
        let svc = service(records);
        // Store covers April only; ask for January
        let request = RecommendationRequest::new(1.0, 3, "2025-01-05", "2025-01-20");
        let response = svc.recommend_on(&request, date(2025, 1, 1)).unwrap();

        assert!(response.fallback);
        assert_eq!(response.message, MSG_FALLBACK);
        assert!(!response.windows.is_empty() && response.windows.len() <= 3);
        let best = response.best_window().unwrap();
        assert_eq!(best.start(), Some(date(2025, 4, 1)));
        assert!(response.windows.iter().all(|w| w.start().unwrap() > date(2025, 1, 20)));
    }

    #[test]
    fn nothing_anywhere_is_a_normal_no_match() {
        let svc = service(vec![record("S1", 6, 1, 1.0, 20.0)]);
        let request = RecommendationRequest::new(1.0, 5, "2025-06-01", "2025-06-30");
        let response = svc.recommend_on(&request, date(2025, 1, 1)).unwrap();
        assert_eq!(response.message, MSG_NO_MATCHES);
        assert_eq!(response.html, "No matches available.");
        assert_eq!(response.outfit_suggestion, "No outfit suggestion available.");
        assert!(response.windows.is_empty() && response.graphs.is_empty());
    }

    #[test]
    fn empty_store_is_not_an_error() {
        let svc = service(Vec::new());
        let request = RecommendationRequest::new(1.0, 2, "2025-03-01", "2025-03-31");
        let response = svc.recommend_on(&request, date(2025, 1, 1)).unwrap();
        assert_eq!(response.message, MSG_NO_DATA);
    }

    #[test]
    fn cross_year_range() {
        let records = vec![
            record("S1", 12, 30, 1.0, 13.0),
            record("S1", 12, 31, 1.0, 13.0),
            record("S1", 1, 1, 1.0, 13.0),
            record("S1", 1, 2, 1.0, 13.0),
        ];
        let svc = service(records);
        let request = RecommendationRequest::new(1.0, 4, "12-29", "01-03");
        let response = svc.recommend_on(&request, date(2025, 11, 1)).unwrap();

        assert!(!response.fallback);
        let best = response.best_window().unwrap();
        assert_eq!(best.start(), Some(date(2025, 12, 30)));
        assert_eq!(best.end(), Some(date(2026, 1, 2)));
        assert!(response
            .outfit_suggestion
            .ends_with("A 4/3mm or 5/4/3mm full-length wetsuit is recommended."));
    }

    #[test]
    fn failed_chart_is_omitted() {
        let mut records = march_store();
        records.extend((1..=31).map(|d| record("broken", 3, d, 1.0, 16.0)));
        let svc = service(records);
        let request = RecommendationRequest::new(1.0, 2, "2025-03-01", "2025-03-31");
        let response = svc.recommend_on(&request, date(2025, 1, 1)).unwrap();
        assert_eq!(response.windows.len(), 3);
        assert_eq!(response.graphs.len(), 2);
        assert!(response.graphs.iter().all(|g| g.location != "broken"));
    }

    #[test]
    fn invalid_inputs_are_client_errors() {
        let svc = service(march_store());
        let today = date(2025, 1, 1);

        let mut request = RecommendationRequest::new(1.0, 0, "2025-03-01", "2025-03-31");
        let err = svc.recommend_on(&request, today).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.message, MSG_BAD_NUM_DAYS);

        request.num_days = Some(NumberOrText::Number(2.5));
        assert_eq!(svc.recommend_on(&request, today).unwrap_err().message, MSG_BAD_NUM_DAYS);

        request.num_days = Some(NumberOrText::Text("3".into()));
        request.wave_height = Some(NumberOrText::Text("big".into()));
        assert_eq!(
            svc.recommend_on(&request, today).unwrap_err().message,
            MSG_BAD_WAVE_HEIGHT
        );

        request.wave_height = Some(NumberOrText::Text("1.5".into()));
        request.end_date = None;
        assert_eq!(svc.recommend_on(&request, today).unwrap_err().message, MSG_MISSING_DATES);

        request.end_date = Some("2025-02-01".into());
        let err = svc.recommend_on(&request, today).unwrap_err();
        assert_eq!(err.class, ErrorClass::InputValidation);

        request.end_date = Some("not a date".into());
        assert_eq!(svc.recommend_on(&request, today).unwrap_err().status_code(), 400);
    }

    #[test]
    fn reload_failure_is_unexpected_and_generic() {
        let svc = service(march_store());
        let err = svc.reload().unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.message, MSG_UNEXPECTED);
        // The previous store is still served
        assert_eq!(svc.store().snapshot().len(), 62);
    }

    #[test]
    fn recommendation_is_idempotent() {
        let svc = service(march_store());
        let request = RecommendationRequest::new(1.2, 3, "03-01", "03-31");
        let today = date(2025, 2, 1);
        let a = svc.recommend_on(&request, today).unwrap();
        let b = svc.recommend_on(&request, today).unwrap();
        assert_eq!(a.windows, b.windows);
        assert_eq!(a.html, b.html);
    }

    #[test]
    fn writes_svg_charts_for_windows() {
        let dir: PathBuf = std::env::temp_dir()
            .join(format!("surfcast-service-charts-{}", std::process::id()));
        let svc = RecommendationService::new(
            ForecastStoreHandle::new(ForecastStore::from_records(march_store())),
            Arc::new(SvgChartRenderer::new(&dir, "/static/charts")),
            &Config::default(),
        );
        let request = RecommendationRequest::new(1.0, 2, "2025-03-01", "2025-03-31");
        let response = svc.recommend_on(&request, date(2025, 1, 1)).unwrap();

        assert_eq!(
            response.graphs[0].wvht,
            "/static/charts/S1_20250310_wvht_forecast.svg"
        );
        assert!(dir.join("S1_20250310_wvht_forecast.svg").exists());
        assert!(dir.join("S2_cleaned_20250301_wtmp_forecast.svg").exists());
        assert_eq!(svc.clear_charts().unwrap(), 4);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn past_range_falls_back_to_upcoming_dates() {
        let records: Vec<ForecastRecord> = (1..=31).map(|d| record("S1", 3, d, 1.0, 16.0)).collect();
        let svc = service(records);
        let request = RecommendationRequest::new(1.0, 2, "2020-03-01", "2020-03-10");
        let today = date(2026, 10, 16);
        let response = svc.recommend_on(&request, today).unwrap();

        assert!(response.fallback);
        assert_eq!(response.message, MSG_FALLBACK);
        let best = response.best_window().unwrap();
        assert_eq!(best.start(), Some(date(2027, 3, 1)));
        assert!(response.windows.iter().all(|w| w.start().unwrap() >= today));
    }

    #[test]
    fn range_in_progress_only_ranks_remaining_days() {
        let records: Vec<ForecastRecord> = (1..=31)
            .map(|d| record("S1", 3, d, if d == 2 { 1.0 } else { 1.5 }, 16.0))
            .collect();
        let svc = service(records);
        let request = RecommendationRequest::new(1.0, 1, "2025-03-01", "2025-03-31");
        let response = svc.recommend_on(&request, date(2025, 3, 15)).unwrap();

        assert!(!response.fallback);
        assert_eq!(response.best_window().unwrap().start(), Some(date(2025, 3, 15)));
    }

    #[test]
    fn repeated_station_fallback_charts_each_window() {
        let dir: PathBuf = std::env::temp_dir()
            .join(format!("surfcast-service-repeat-{}", std::process::id()));
        let mut config = Config::default();
        config.ranking.fallback_distinct_stations = false;
        let records: Vec<ForecastRecord> = (1..=10)
            .map(|d| record("S1", 4, d, 1.0 + d as f64 / 10.0, 14.0))
            .collect();
        let svc = RecommendationService::new(
            ForecastStoreHandle::new(ForecastStore::from_records(records)),
            Arc::new(SvgChartRenderer::new(&dir, "/static/charts")),
            &config,
        );
        let request = RecommendationRequest::new(1.0, 2, "2025-01-05", "2025-01-20");
        let response = svc.recommend_on(&request, date(2025, 1, 1)).unwrap();

        assert!(response.fallback);
        assert_eq!(response.windows.len(), 3);
        assert!(response.windows.iter().all(|w| w.station_id == "S1"));
        assert_eq!(response.graphs.len(), 3);
        let files: std::collections::HashSet<&str> =
            response.graphs.iter().map(|g| g.wvht.as_str()).collect();
        assert_eq!(files.len(), 3);
        assert_eq!(svc.clear_charts().unwrap(), 6);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn service_without_charts_skips_rendering() {
        let svc = RecommendationService::without_charts(
            ForecastStoreHandle::new(ForecastStore::from_records(march_store())),
            &Config::default(),
        );
        let request = RecommendationRequest::new(1.0, 2, "2025-03-01", "2025-03-31");
        let response = svc.recommend_on(&request, date(2025, 1, 1)).unwrap();
        assert_eq!(response.windows.len(), 2);
        assert!(response.graphs.is_empty());
        assert_eq!(svc.clear_charts().unwrap(), 0);
    }

    #[test]
    fn leap_day_window_in_leap_year_only() {
        let records = vec![
            record("S1", 2, 28, 1.0, 12.0),
            record("S1", 2, 29, 1.0, 12.0),
            record("S1", 3, 1, 1.0, 12.0),
        ];
        let svc = service(records);
        let request = RecommendationRequest::new(1.0, 3, "02-27", "03-02");

        let leap = svc.recommend_on(&request, date(2028, 1, 1)).unwrap();
        assert_eq!(leap.windows.len(), 1);
        assert_eq!(leap.windows[0].start(), Some(date(2028, 2, 28)));

        // 2027 has no Feb 29; the next three-day run is the following leap year
        let common = svc.recommend_on(&request, date(2027, 1, 1)).unwrap();
        assert!(common.fallback);
        assert_eq!(common.windows[0].start(), Some(date(2028, 2, 28)));
    }
}
