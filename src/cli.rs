use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "episcore",
    version,
    about = "Scorecards for pre-computed epidemiological forecasts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load and join the inputs, report coverage without summarizing
    Inspect(InputArgs),
    /// Per-model rate of forecast totals exceeding observed totals
    Overprediction(SummaryArgs),
    /// Per-model rate of correctly predicted increases
    Direction(SummaryArgs),
    /// Both summaries plus a JSON report manifest
    Report(ReportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Forecast CSV (model,date,ci_level,forecast_date,mean,lower,upper); repeatable
    #[arg(long = "forecast-csv", required = true)]
    pub forecast_csvs: Vec<PathBuf>,

    /// Observed case counts CSV (date,cases)
    #[arg(long)]
    pub cases_csv: PathBuf,

    /// Confidence-interval level whose rows feed the summaries
    #[arg(long, default_value_t = 95.0)]
    pub ci_level: f64,

    /// Keep only forecasts targeting this date or later (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Keep only forecasts targeting this date or earlier (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Args, Debug, Clone)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Where to write the report manifest
    #[arg(long, default_value = "report.json")]
    pub report_path: PathBuf,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
