use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "surfcast",
    version,
    about = "Buoy forecasts and surf vacation-window recommendations"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fit models for every station file and write the forecast store
    Forecast {
        /// Directory of cleaned station CSV files
        #[arg(long)]
        station_dir: Option<PathBuf>,

        /// Forecast store to write
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory for held-out evaluation plots
        #[arg(long)]
        plots_dir: Option<PathBuf>,

        /// Skip evaluation plots
        #[arg(long)]
        no_plots: bool,
    },
    /// Rank vacation windows for one query and print the result as JSON
    Recommend {
        /// Preferred wave height in meters
        #[arg(short = 'w', long)]
        wave_height: f64,

        /// Number of consecutive days
        #[arg(short = 'n', long, default_value_t = 1)]
        days: usize,

        /// First day of the trip (YYYY-MM-DD or MM-DD)
        #[arg(short, long)]
        start: String,

        /// Last day of the trip (YYYY-MM-DD or MM-DD)
        #[arg(short, long)]
        end: String,

        /// Skip chart generation
        #[arg(long)]
        no_charts: bool,
    },
    /// Validate config and input files
    Check,
}

impl Cli {
    /// Log filter for the requested verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}
