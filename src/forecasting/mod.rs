pub mod model;
pub mod pipeline;
pub mod temperature;
pub mod wave_height;

pub use model::{normal_quantile, FittedModel, Sample, SeasonalModel};
pub use pipeline::{BatchSummary, Evaluation, ForecastPipeline, SkippedStation, StationForecast};
pub use temperature::TemperatureForecaster;
pub use wave_height::{TemperatureRegressor, WaveHeightForecaster};
