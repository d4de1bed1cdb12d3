//! Cleaned buoy station files.
//!
//! Each station is one CSV file named after the station id with at least the
//! columns `#YY, MM, DD, WVHT, WTMP` (`ATMP` optional). Buoys report `99` or
//! more for an invalid wave height and `999` for a missing temperature; those
//! become `None`. When a day has several rows, the row with the largest valid
//! wave height wins.

use crate::error::{Result, SurfcastError};
use crate::models::{valid_temperature, valid_wave_height, Observation, StationSeries};
use chrono::NaiveDate;
use csv::StringRecord;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const COL_YEAR: &str = "#YY";
const COL_MONTH: &str = "MM";
const COL_DAY: &str = "DD";
const COL_WAVE_HEIGHT: &str = "WVHT";
const COL_WATER_TEMP: &str = "WTMP";
const COL_AIR_TEMP: &str = "ATMP";

/// The set of station files found in a data directory.
#[derive(Debug, Clone, Default)]
pub struct StationDataset {
    pub files: Vec<PathBuf>,
}

impl StationDataset {
    /// List station files (`*.csv`) in `dir`, sorted by file name.
    pub fn discover(dir: &Path) -> Result<Self> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .map(|ext| ext.eq_ignore_ascii_case("csv"))
                        .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(Self { files })
    }

    pub fn station_ids(&self) -> Vec<String> {
        self.files.iter().map(|p| station_id_from_path(p)).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Station id is the file stem, e.g. `CleanedData/46025.csv` -> `46025`.
pub fn station_id_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn load_station(path: &Path) -> Result<StationSeries> {
    let station_id = station_id_from_path(path);
    let file = std::fs::File::open(path)?;
    parse_station_csv(&station_id, file)
}

struct Columns {
    year: usize,
    month: usize,
    day: usize,
    wave_height: usize,
    water_temp: usize,
    air_temp: Option<usize>,
}

impl Columns {
    fn locate(station_id: &str, headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);

        let required = [COL_YEAR, COL_MONTH, COL_DAY, COL_WAVE_HEIGHT, COL_WATER_TEMP];
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|name| find(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(SurfcastError::MissingColumns {
                source_name: station_id.to_string(),
                columns: missing.join(", "),
            });
        }

        // All required columns were found above
        Ok(Self {
            year: find(COL_YEAR).unwrap_or_default(),
            month: find(COL_MONTH).unwrap_or_default(),
            day: find(COL_DAY).unwrap_or_default(),
            wave_height: find(COL_WAVE_HEIGHT).unwrap_or_default(),
            water_temp: find(COL_WATER_TEMP).unwrap_or_default(),
            air_temp: find(COL_AIR_TEMP),
        })
    }

    fn date(&self, r: &StringRecord) -> Option<NaiveDate> {
        let mut year: i32 = field(r, self.year)?.parse::<f64>().ok()? as i32;
        // Pre-1999 NDBC files use two-digit years
        if (0..100).contains(&year) {
            year += 1900;
        }
        let month = field(r, self.month)?.parse::<f64>().ok()? as u32;
        let day = field(r, self.day)?.parse::<f64>().ok()? as u32;
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

fn field(r: &StringRecord, idx: usize) -> Option<&str> {
    r.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn number(r: &StringRecord, idx: usize) -> Option<f64> {
    field(r, idx)?.parse().ok()
}

pub fn parse_station_csv<R: Read>(station_id: &str, reader: R) -> Result<StationSeries> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let columns = Columns::locate(station_id, rdr.headers()?)?;

    let mut by_date: BTreeMap<NaiveDate, Observation> = BTreeMap::new();
    let mut skipped = 0u32;
    for result in rdr.records() {
        let r = result?;
        let Some(date) = columns.date(&r) else {
            skipped += 1;
            continue;
        };

        let obs = Observation {
            date,
            wave_height: number(&r, columns.wave_height).and_then(valid_wave_height),
            water_temp: number(&r, columns.water_temp).and_then(valid_temperature),
            air_temp: columns
                .air_temp
                .and_then(|idx| number(&r, idx))
                .and_then(valid_temperature),
        };

        match by_date.get(&date) {
            Some(existing) if !replaces(&obs, existing) => {}
            _ => {
                by_date.insert(date, obs);
            }
        }
    }

    if skipped > 0 {
        warn!(
            "{}: skipped {} rows with unparseable dates",
            station_id, skipped
        );
    }
    debug!("{}: loaded {} daily observations", station_id, by_date.len());

    Ok(StationSeries::new(
        station_id,
        by_date.into_values().collect(),
    ))
}

/// A reading replaces the day's current row only with a strictly larger valid wave height.
fn replaces(candidate: &Observation, existing: &Observation) -> bool {
    match (candidate.wave_height, existing.wave_height) {
        (Some(new), Some(old)) => new > old,
        (Some(_), None) => true,
        _ => false,
    }
}
