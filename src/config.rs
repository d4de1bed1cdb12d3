use crate::error::{Result, SurfcastError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub forecasting: ForecastingConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    /// Directory of cleaned per-station CSV files, one file per station.
    #[serde(default = "default_station_dir")]
    pub station_dir: PathBuf,
    #[serde(default = "default_forecast_file")]
    pub forecast_file: PathBuf,
    #[serde(default = "default_chart_dir")]
    pub chart_dir: PathBuf,
    /// URL prefix under which `chart_dir` is served.
    #[serde(default = "default_chart_url_prefix")]
    pub chart_url_prefix: String,
    /// Held-out evaluation plots written by the forecast batch.
    #[serde(default = "default_plots_dir")]
    pub plots_dir: PathBuf,
}

fn default_station_dir() -> PathBuf {
    PathBuf::from("CleanedData")
}

fn default_forecast_file() -> PathBuf {
    PathBuf::from("forecast.csv")
}

fn default_chart_dir() -> PathBuf {
    PathBuf::from("static/charts")
}

fn default_chart_url_prefix() -> String {
    "/static/charts".into()
}

fn default_plots_dir() -> PathBuf {
    PathBuf::from("plots")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            station_dir: default_station_dir(),
            forecast_file: default_forecast_file(),
            chart_dir: default_chart_dir(),
            chart_url_prefix: default_chart_url_prefix(),
            plots_dir: default_plots_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForecastingConfig {
    /// Models train on observations strictly before this date.
    #[serde(default = "default_train_cutoff")]
    pub train_cutoff: NaiveDate,
    /// First forecast date written to the store; later observations are held out for scoring.
    #[serde(default = "default_forecast_start")]
    pub forecast_start: NaiveDate,
    #[serde(default = "default_min_horizon_days")]
    pub min_horizon_days: u32,
    #[serde(default = "default_temperature_interval")]
    pub temperature_interval: f64,
    #[serde(default = "default_wave_height_interval")]
    pub wave_height_interval: f64,
    #[serde(default = "default_fourier_order")]
    pub fourier_order: usize,
}

fn default_train_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
}

fn default_forecast_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default()
}

fn default_min_horizon_days() -> u32 {
    366
}

fn default_temperature_interval() -> f64 {
    0.90
}

fn default_wave_height_interval() -> f64 {
    0.70
}

fn default_fourier_order() -> usize {
    10
}

impl Default for ForecastingConfig {
    fn default() -> Self {
        Self {
            train_cutoff: default_train_cutoff(),
            forecast_start: default_forecast_start(),
            min_horizon_days: default_min_horizon_days(),
            temperature_interval: default_temperature_interval(),
            wave_height_interval: default_wave_height_interval(),
            fourier_order: default_fourier_order(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RankingConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// One window per station when searching after the requested range.
    #[serde(default = "default_enabled")]
    pub fallback_distinct_stations: bool,
    #[serde(default = "default_fallback_lookahead_days")]
    pub fallback_lookahead_days: u32,
}

fn default_top_k() -> usize {
    3
}

fn default_enabled() -> bool {
    true
}

fn default_fallback_lookahead_days() -> u32 {
    365
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            fallback_distinct_stations: default_enabled(),
            fallback_lookahead_days: default_fallback_lookahead_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind() -> String {
    "127.0.0.1:5000".into()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            static_dir: default_static_dir(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Config {
    pub fn load(config_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_override {
            Some(p) => p,
            None => Self::find_config_path()?,
        };

        if !config_path.exists() {
            return Err(SurfcastError::Config(format!(
                "Config file not found at {:?}",
                config_path
            )));
        }

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| SurfcastError::Config(format!("Failed to read config: {}", e)))?;

        let config = Self::from_yaml(&config_str)?;
        tracing::debug!("Loaded configuration from {}", config_path.display());
        Ok(config)
    }

    /// Like [`Config::load`], but an absent config file (with no explicit override)
    /// yields the defaults.
    pub fn load_or_default(config_override: Option<PathBuf>) -> Result<Self> {
        if config_override.is_none() && !Self::exists(None) {
            tracing::info!("No config file found - using defaults");
            return Ok(Self::default());
        }
        Self::load(config_override)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // Substitute environment variables
        let content = Self::substitute_env_vars(content);

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| SurfcastError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, width) in [
            ("temperature_interval", self.forecasting.temperature_interval),
            ("wave_height_interval", self.forecasting.wave_height_interval),
        ] {
            if !(width > 0.0 && width < 1.0) {
                return Err(SurfcastError::Config(format!(
                    "forecasting.{} must be between 0 and 1, got {}",
                    name, width
                )));
            }
        }
        if self.ranking.top_k == 0 {
            return Err(SurfcastError::Config("ranking.top_k must be at least 1".into()));
        }
        if self.forecasting.fourier_order == 0 {
            return Err(SurfcastError::Config(
                "forecasting.fourier_order must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Search for config.yaml in standard locations.
    /// Returns the path of the first found config, or the XDG default path if none found.
    fn find_config_path() -> Result<PathBuf> {
        // Try current directory first
        let local_config = PathBuf::from("config/config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let default_path = dirs::config_dir()
            .ok_or_else(|| SurfcastError::Config("Cannot determine config directory".into()))?
            .join("surfcast")
            .join("config.yaml");
        Ok(default_path)
    }

    /// Returns true if a config file can be found in any standard location.
    pub fn exists(config_override: Option<&PathBuf>) -> bool {
        match config_override {
            Some(p) => p.exists(),
            None => Self::find_config_path()
                .map(|p| p.exists())
                .unwrap_or(false),
        }
    }

    fn substitute_env_vars(content: &str) -> String {
        let mut result = content.to_string();

        // Find all ${VAR_NAME} patterns and substitute
        let Ok(re) = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") else {
            return result;
        };

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(placeholder, &value);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_pipeline() {
        let config = Config::default();
        assert_eq!(config.forecasting.train_cutoff.to_string(), "2024-01-01");
        assert_eq!(config.forecasting.forecast_start.to_string(), "2023-01-01");
        assert!((config.forecasting.temperature_interval - 0.90).abs() < 1e-12);
        assert!((config.forecasting.wave_height_interval - 0.70).abs() < 1e-12);
        assert_eq!(config.ranking.top_k, 3);
        assert!(config.ranking.fallback_distinct_stations);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = r#"
ranking:
  top_k: 5
  fallback_distinct_stations: false
data:
  forecast_file: /tmp/forecast.csv
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.ranking.top_k, 5);
        assert!(!config.ranking.fallback_distinct_stations);
        assert_eq!(config.data.forecast_file, PathBuf::from("/tmp/forecast.csv"));
        assert_eq!(config.data.station_dir, PathBuf::from("CleanedData"));
        assert_eq!(config.data.plots_dir, PathBuf::from("plots"));
        assert_eq!(config.server.bind, "127.0.0.1:5000");
    }

    #[test]
    fn env_vars_are_substituted() {
        std::env::set_var("SURFCAST_TEST_BIND", "0.0.0.0:8080");
        let yaml = "server:\n  bind: \"${SURFCAST_TEST_BIND}\"\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
    }

    #[test]
    fn invalid_interval_is_rejected() {
        let yaml = "forecasting:\n  wave_height_interval: 1.5\n";
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(SurfcastError::Config(_))
        ));
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let yaml = "ranking:\n  top_k: 0\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn dates_parse_from_yaml() {
        let yaml = "forecasting:\n  train_cutoff: 2025-06-01\n  forecast_start: 2024-06-01\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(
            config.forecasting.train_cutoff,
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
        );
    }
}
