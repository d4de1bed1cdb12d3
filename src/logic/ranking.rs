use crate::models::{ForecastDay, VacationWindow};
use chrono::Duration;
use std::collections::HashSet;
use std::num::NonZeroUsize;

/// Ranks N-day windows by how closely their forecast wave height matches a target.
#[derive(Debug, Clone)]
pub struct WindowRanker {
    top_k: usize,
    distinct_stations: bool,
}

impl WindowRanker {
    pub fn new(top_k: usize, distinct_stations: bool) -> Self {
        Self {
            top_k,
            distinct_stations,
        }
    }

    /// Every window of `n` consecutive calendar days at a single station, in
    /// input order.
    ///
    /// `days` is expected grouped by station and date-ordered within a
    /// station, as produced by `ForecastStore::project`.
    pub fn candidates(
        days: &[ForecastDay<'_>],
        target: f64,
        n: NonZeroUsize,
    ) -> Vec<VacationWindow> {
        let n = n.get();
        let mut windows = Vec::new();
        for run in runs(days) {
            for slice in run.windows(n) {
                let score = slice
                    .iter()
                    .map(|d| (d.record.wave_height.point - target).abs())
                    .sum();
                windows.push(VacationWindow::from_days(slice, score));
            }
        }
        windows
    }

    /// Best windows first, at most `top_k`. Ties keep enumeration order.
    pub fn rank(
        &self,
        days: &[ForecastDay<'_>],
        target: f64,
        n: NonZeroUsize,
    ) -> Vec<VacationWindow> {
        let mut candidates = Self::candidates(days, target, n);
        candidates.sort_by(|a, b| a.score.total_cmp(&b.score));

        let mut seen: HashSet<String> = HashSet::new();
        candidates
            .into_iter()
            .filter(|w| !self.distinct_stations || seen.insert(w.station_id.clone()))
            .take(self.top_k)
            .collect()
    }
}

/// Split into maximal runs of consecutive dates at one station.
fn runs<'s, 'a>(days: &'s [ForecastDay<'a>]) -> Vec<&'s [ForecastDay<'a>]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=days.len() {
        let breaks = i == days.len() || {
            let (prev, cur) = (&days[i - 1], &days[i]);
            prev.station_id() != cur.station_id() || cur.date != prev.date + Duration::days(1)
        };
        if breaks {
            if start < i {
                runs.push(&days[start..i]);
            }
            start = i;
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DayKey, Estimate, ForecastRecord};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(station: &str, d: NaiveDate, wvht: f64) -> ForecastRecord {
        ForecastRecord {
            station_id: station.into(),
            day_key: DayKey::from_date(d),
            wave_height: Estimate::new(wvht, wvht - 0.2, wvht + 0.2),
            water_temp: Estimate::new(16.0, 15.0, 17.0),
        }
    }

    fn days_of(records: &[ForecastRecord], year: i32) -> Vec<ForecastDay<'_>> {
        records
            .iter()
            .map(|r| ForecastDay {
                date: r.day_key.in_year(year).unwrap(),
                record: r,
            })
            .collect()
    }

    fn n(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).unwrap()
    }

    #[test]
    fn best_window_minimises_deviation() {
        // Every March day at one station
        let heights = [1.5, 1.2, 0.9, 1.1, 2.0, 0.4, 1.0, 1.0];
        let records: Vec<ForecastRecord> = (1..=31)
            .map(|d| record("S1", date(2025, 3, d), heights[(d as usize) % heights.len()]))
            .collect();
        let days = days_of(&records, 2025);

        let ranked = WindowRanker::new(3, true).rank(&days, 1.0, n(2));
        assert_eq!(ranked.len(), 1);
        let best = &ranked[0];
        assert_eq!(best.len(), 2);

        let all = WindowRanker::candidates(&days, 1.0, n(2));
        assert_eq!(all.len(), 30);
        let min = all.iter().map(|w| w.score).fold(f64::INFINITY, f64::min);
        assert!((best.score - min).abs() < 1e-12);
        // Heights 1.0, 1.0 first appear at March 6-7
        assert_eq!(best.start(), Some(date(2025, 3, 6)));
    }

    #[test]
    fn one_window_per_station_when_distinct() {
        let mut records = Vec::new();
        for (station, base) in [("A", 1.0), ("B", 1.3), ("C", 1.6), ("D", 2.0)] {
            for d in 1..=5 {
                records.push(record(station, date(2025, 6, d), base));
            }
        }
        let days = days_of(&records, 2025);

        let ranked = WindowRanker::new(3, true).rank(&days, 1.0, n(3));
        let stations: Vec<&str> = ranked.iter().map(|w| w.station_id.as_str()).collect();
        assert_eq!(stations, vec!["A", "B", "C"]);
        assert!(ranked.windows(2).all(|w| w[0].score <= w[1].score));

        let ranked = WindowRanker::new(3, false).rank(&days, 1.0, n(3));
        assert!(ranked.iter().all(|w| w.station_id == "A"));
        let starts: Vec<NaiveDate> = ranked.iter().filter_map(|w| w.start()).collect();
        // Equal scores keep date order
        assert_eq!(starts, vec![date(2025, 6, 1), date(2025, 6, 2), date(2025, 6, 3)]);
    }

    #[test]
    fn windows_never_cross_stations_or_gaps() {
        let records = vec![
            record("A", date(2025, 6, 1), 1.0),
            record("A", date(2025, 6, 2), 1.0),
            record("B", date(2025, 6, 3), 1.0),
            record("B", date(2025, 6, 4), 1.0),
            record("B", date(2025, 6, 6), 1.0),
        ];
        let days = days_of(&records, 2025);
        let windows = WindowRanker::candidates(&days, 1.0, n(2));
        let spans: Vec<(&str, NaiveDate)> = windows
            .iter()
            .map(|w| (w.station_id.as_str(), w.start().unwrap()))
            .collect();
        assert_eq!(spans, vec![("A", date(2025, 6, 1)), ("B", date(2025, 6, 3))]);
    }

    #[test]
    fn window_longer_than_data_yields_nothing() {
        let records = vec![record("A", date(2025, 6, 1), 1.0)];
        let days = days_of(&records, 2025);
        assert!(WindowRanker::new(3, true).rank(&days, 1.0, n(2)).is_empty());
        assert!(WindowRanker::new(3, true).rank(&[], 1.0, n(1)).is_empty());
    }

    #[test]
    fn ranking_is_idempotent() {
        let records: Vec<ForecastRecord> = (1..=20)
            .map(|d| record(if d % 2 == 0 { "A" } else { "B" }, date(2025, 8, d), d as f64 / 10.0))
            .collect();
        let mut days = days_of(&records, 2025);
        days.sort_by(|a, b| a.station_id().cmp(b.station_id()).then(a.date.cmp(&b.date)));

        let ranker = WindowRanker::new(3, false);
        let first = ranker.rank(&days, 1.0, n(1));
        let second = ranker.rank(&days, 1.0, n(1));
        assert_eq!(first, second);
        assert_eq!(first[0].start(), Some(date(2025, 8, 10)));
    }

    #[test]
    fn window_spans_year_boundary() {
        let a = record("A", date(2025, 12, 31), 1.0);
        let b = record("A", date(2026, 1, 1), 1.0);
        let days = vec![
            ForecastDay {
                date: date(2025, 12, 31),
                record: &a,
            },
            ForecastDay {
                date: date(2026, 1, 1),
                record: &b,
            },
        ];
        let ranked = WindowRanker::new(3, true).rank(&days, 1.0, n(2));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].end(), Some(date(2026, 1, 1)));
    }
}
