pub mod forecast_store;
pub mod station;

pub use forecast_store::{ForecastCsvWriter, ForecastStore, ForecastStoreHandle, STORE_COLUMNS};
pub use station::{load_station, parse_station_csv, station_id_from_path, StationDataset};
