mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;
use surfcast::charts::{EvaluationPlotter, SvgChartRenderer};
use surfcast::datasources::{
    load_station, ForecastCsvWriter, ForecastStore, ForecastStoreHandle, StationDataset,
};
use surfcast::forecasting::ForecastPipeline;
use surfcast::logic::RecommendationService;
use surfcast::models::{ErrorBody, RecommendationRequest};
use surfcast::{Config, Result};
use tracing_subscriber::EnvFilter;

fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .init();

    let config = match Config::load_or_default(cli.config.clone()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            eprintln!("Please copy config/config.yaml.example to config/config.yaml");
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Forecast {
            station_dir,
            output,
            plots_dir,
            no_plots,
        } => {
            let plots_dir = (!no_plots)
                .then(|| plots_dir.unwrap_or_else(|| config.data.plots_dir.clone()));
            run_forecast(
                &config,
                station_dir.as_deref(),
                output.as_deref(),
                plots_dir.as_deref(),
            )
        }
        Commands::Recommend {
            wave_height,
            days,
            start,
            end,
            no_charts,
        } => run_recommend(
            &config,
            RecommendationRequest::new(wave_height, days, start, end),
            no_charts,
        ),
        Commands::Check => run_check(&config),
    };

    match code {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_forecast(
    config: &Config,
    station_dir: Option<&Path>,
    output: Option<&Path>,
    plots_dir: Option<&Path>,
) -> Result<i32> {
    let station_dir = station_dir.unwrap_or(&config.data.station_dir);
    let output = output.unwrap_or(&config.data.forecast_file);

    let dataset = StationDataset::discover(station_dir)?;
    if dataset.is_empty() {
        eprintln!("No station files found in {}", station_dir.display());
        return Ok(1);
    }

    let mut pipeline = ForecastPipeline::new(&config.forecasting);
    if let Some(dir) = plots_dir {
        pipeline = pipeline.with_evaluation_plots(EvaluationPlotter::new(dir));
    }
    let mut writer = ForecastCsvWriter::create(output)?;
    let summary = pipeline.run(&dataset, &mut writer)?;
    writer.finish()?;

    println!(
        "Wrote {} records for {} stations to {}",
        summary.total_records(),
        summary.written.len(),
        output.display()
    );
    for station in &summary.written {
        let fmt = |mae: Option<f64>| mae.map(|m| format!("{:.3}", m)).unwrap_or_else(|| "-".into());
        println!(
            "  {:<20} {:>5} records  MAE wvht {}  wtmp {}  plots {}",
            station.station_id,
            station.records,
            fmt(station.evaluation.wave_height_mae),
            fmt(station.evaluation.water_temp_mae),
            station.plots.len()
        );
    }
    for skipped in &summary.skipped {
        println!("  {:<20} skipped: {}", skipped.station_id, skipped.reason);
    }
    Ok(if summary.written.is_empty() { 1 } else { 0 })
}

fn run_recommend(config: &Config, request: RecommendationRequest, no_charts: bool) -> Result<i32> {
    let store = ForecastStoreHandle::open(&config.data.forecast_file)?;
    let service = if no_charts {
        RecommendationService::without_charts(store, config)
    } else {
        let charts = Arc::new(SvgChartRenderer::new(
            &config.data.chart_dir,
            config.data.chart_url_prefix.clone(),
        ));
        RecommendationService::new(store, charts, config)
    };

    match service.recommend(&request) {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(0)
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&ErrorBody::from(&e))?);
            Ok(if e.status_code() == 400 { 2 } else { 1 })
        }
    }
}

fn run_check(config: &Config) -> Result<i32> {
    let mut ok = true;
    println!("Configuration: OK");

    match StationDataset::discover(&config.data.station_dir) {
        Ok(dataset) => {
            println!(
                "Station files: {} in {}",
                dataset.len(),
                config.data.station_dir.display()
            );
            for path in &dataset.files {
                match load_station(path) {
                    Ok(series) => println!(
                        "  {:<20} {} days",
                        series.station_id,
                        series.observations.len()
                    ),
                    Err(e) => {
                        ok = false;
                        println!("  {:<20} ERROR: {}", path.display(), e);
                    }
                }
            }
        }
        Err(e) => {
            ok = false;
            println!(
                "Station files: ERROR reading {}: {}",
                config.data.station_dir.display(),
                e
            );
        }
    }

    match ForecastStore::read_csv(&config.data.forecast_file) {
        Ok(store) => println!(
            "Forecast store: {} records for {} stations",
            store.len(),
            store.station_ids().count()
        ),
        Err(e) => {
            ok = false;
            println!(
                "Forecast store: ERROR reading {}: {}",
                config.data.forecast_file.display(),
                e
            );
        }
    }

    Ok(if ok { 0 } else { 1 })
}
