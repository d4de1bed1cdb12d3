//! The combined forecast file produced by the offline pipeline and read by the
//! recommendation service.

use crate::error::{Result, SurfcastError};
use crate::models::{DayKey, Estimate, ForecastDay, ForecastRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

pub const STORE_COLUMNS: [&str; 8] = [
    "station_id",
    "ds",
    "yhat",
    "yhat_lower",
    "yhat_upper",
    "WTMP_pred",
    "WTMP_pred_lower",
    "WTMP_pred_upper",
];

#[derive(Debug, Serialize, Deserialize)]
struct StoreRow {
    station_id: String,
    ds: DayKey,
    yhat: f64,
    yhat_lower: f64,
    yhat_upper: f64,
    #[serde(rename = "WTMP_pred")]
    wtmp_pred: f64,
    #[serde(rename = "WTMP_pred_lower")]
    wtmp_pred_lower: f64,
    #[serde(rename = "WTMP_pred_upper")]
    wtmp_pred_upper: f64,
}

impl From<&ForecastRecord> for StoreRow {
    fn from(r: &ForecastRecord) -> Self {
        Self {
            station_id: r.station_id.clone(),
            ds: r.day_key,
            yhat: r.wave_height.point,
            yhat_lower: r.wave_height.lower,
            yhat_upper: r.wave_height.upper,
            wtmp_pred: r.water_temp.point,
            wtmp_pred_lower: r.water_temp.lower,
            wtmp_pred_upper: r.water_temp.upper,
        }
    }
}

impl From<StoreRow> for ForecastRecord {
    fn from(r: StoreRow) -> Self {
        Self {
            station_id: r.station_id,
            day_key: r.ds,
            wave_height: Estimate::new(r.yhat, r.yhat_lower, r.yhat_upper),
            water_temp: Estimate::new(r.wtmp_pred, r.wtmp_pred_lower, r.wtmp_pred_upper),
        }
    }
}

/// Forecast records keyed by station, then by day of year.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastStore {
    stations: BTreeMap<String, BTreeMap<DayKey, ForecastRecord>>,
}

impl ForecastStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = ForecastRecord>) -> Self {
        let mut store = Self::new();
        store.extend(records);
        store
    }

    /// Insert a record, replacing any existing record for the same station and day.
    pub fn insert(&mut self, record: ForecastRecord) {
        self.stations
            .entry(record.station_id.clone())
            .or_default()
            .insert(record.day_key, record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = ForecastRecord>) {
        for record in records {
            self.insert(record);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Total number of records across all stations.
    pub fn len(&self) -> usize {
        self.stations.values().map(BTreeMap::len).sum()
    }

    pub fn station_ids(&self) -> impl Iterator<Item = &str> {
        self.stations.keys().map(String::as_str)
    }

    pub fn station_records(&self, station_id: &str) -> impl Iterator<Item = &ForecastRecord> {
        self.stations
            .get(station_id)
            .into_iter()
            .flat_map(|days| days.values())
    }

    /// All records, grouped by station and ordered by day key.
    pub fn records(&self) -> impl Iterator<Item = &ForecastRecord> {
        self.stations.values().flat_map(|days| days.values())
    }

    /// Place the store's records on the calendar dates `start..=end`.
    ///
    /// Results are grouped by station (ascending id) and ordered by date within
    /// a station. Dates whose day key has no record are omitted, so a station's
    /// run may contain gaps.
    pub fn project(&self, start: NaiveDate, end: NaiveDate) -> Vec<ForecastDay<'_>> {
        self.stations
            .keys()
            .flat_map(|id| self.project_station(id, start, end))
            .collect()
    }

    pub fn project_station(
        &self,
        station_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<ForecastDay<'_>> {
        let Some(days) = self.stations.get(station_id) else {
            return Vec::new();
        };
        if start > end {
            return Vec::new();
        }
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter_map(|date| {
                days.get(&DayKey::from_date(date))
                    .map(|record| ForecastDay { date, record })
            })
            .collect()
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let store = Self::from_reader(&path.display().to_string(), file)?;
        info!(
            "Loaded {} forecast records for {} stations from {}",
            store.len(),
            store.stations.len(),
            path.display()
        );
        Ok(store)
    }

    pub fn from_reader<R: Read>(source_name: &str, reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

        let headers = rdr.headers()?;
        let missing: Vec<&str> = STORE_COLUMNS
            .iter()
            .copied()
            .filter(|col| !headers.iter().any(|h| h.trim() == *col))
            .collect();
        if !missing.is_empty() {
            return Err(SurfcastError::MissingColumns {
                source_name: source_name.to_string(),
                columns: missing.join(", "),
            });
        }

        let mut store = Self::new();
        let mut rejected = 0;
        for row in rdr.deserialize::<StoreRow>() {
            let record: ForecastRecord = row?.into();
            if !record.is_consistent() {
                debug!(
                    "{}: bounds out of order for {} {}",
                    source_name, record.station_id, record.day_key
                );
                rejected += 1;
                continue;
            }
            store.insert(record);
        }
        if rejected > 0 {
            warn!(
                "{}: skipped {} records whose bounds do not enclose the point forecast",
                source_name, rejected
            );
        }
        Ok(store)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = ForecastCsvWriter::create(path)?;
        writer.append_station(self.records())?;
        writer.finish()
    }
}

/// Streams forecast records to CSV one station at a time, with a single header.
pub struct ForecastCsvWriter<W: Write> {
    inner: csv::Writer<W>,
    rows: usize,
}

impl ForecastCsvWriter<File> {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::new(File::create(path)?)
    }
}

impl<W: Write> ForecastCsvWriter<W> {
    pub fn new(writer: W) -> Result<Self> {
        let mut inner = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        inner.write_record(STORE_COLUMNS)?;
        Ok(Self { inner, rows: 0 })
    }

    pub fn append_station<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a ForecastRecord>,
    ) -> Result<usize> {
        let mut written = 0;
        for record in records {
            self.inner.serialize(StoreRow::from(record))?;
            written += 1;
        }
        self.inner.flush()?;
        self.rows += written;
        Ok(written)
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn finish(mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.inner
            .into_inner()
            .map_err(|e| SurfcastError::Io(e.into_error()))
    }
}

/// Shared read-only access to the current forecast store.
///
/// Readers take a snapshot and keep it for the duration of a request;
/// `reload` swaps in a new store without disturbing them.
#[derive(Debug, Clone)]
pub struct ForecastStoreHandle {
    path: Option<PathBuf>,
    current: Arc<RwLock<Arc<ForecastStore>>>,
}

impl ForecastStoreHandle {
    pub fn new(store: ForecastStore) -> Self {
        Self {
            path: None,
            current: Arc::new(RwLock::new(Arc::new(store))),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let store = ForecastStore::read_csv(path)?;
        Ok(Self::with_path(store, path))
    }

    /// A handle serving `store` that reloads from `path`.
    pub fn with_path(store: ForecastStore, path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            current: Arc::new(RwLock::new(Arc::new(store))),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn snapshot(&self) -> Arc<ForecastStore> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn replace(&self, store: ForecastStore) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(store);
    }

    /// Re-read the backing file and swap it in. Returns the new record count.
    pub fn reload(&self) -> Result<usize> {
        let path = self.path.as_deref().ok_or_else(|| {
            SurfcastError::Config("Forecast store has no backing file to reload".into())
        })?;
        let store = ForecastStore::read_csv(path)?;
        let count = store.len();
        self.replace(store);
        debug!("Reloaded forecast store from {}", path.display());
        Ok(count)
    }
}
