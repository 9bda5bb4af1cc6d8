use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::InvalidTilePolicy;
use crate::io::Delimiter;

#[derive(Debug, Parser)]
#[command(
    name = "kira-fibroqc",
    version,
    about = "Slide-level fibrosis staging from tile classifier outputs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Run(RunArgs),
    Thresholds(ThresholdsArgs),
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(short = 'c', long, help = "Run configuration (*.yaml)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Tile prediction table (overrides classifier.predictions)")]
    pub predictions: Option<PathBuf>,

    #[arg(long, help = "Results directory (overrides results.results_path)")]
    pub out: Option<PathBuf>,

    #[arg(long, help = "Experiment name (overrides results.experiment_name)")]
    pub experiment: Option<String>,

    #[arg(long, help = "Threshold rules JSON (default: built-in fibrosis_v1)")]
    pub thresholds: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub invalid_tiles: Option<InvalidTilePolicy>,

    #[arg(long, value_enum, help = "Prediction table delimiter")]
    pub delimiter: Option<Delimiter>,

    #[arg(long, default_value_t = false, help = "Also write <experiment>_report.json")]
    pub json: bool,

    #[arg(
        long,
        default_value_t = false,
        help = "Also write the summary with n_tiles and average_uncertainty"
    )]
    pub audit: bool,

    #[arg(long, default_value_t = 0, help = "Number of threads (0 = auto)")]
    pub threads: usize,
}

#[derive(Debug, Args)]
pub struct ThresholdsArgs {
    #[command(subcommand)]
    pub command: ThresholdsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ThresholdsCommand {
    Show(ThresholdsShowArgs),
}

#[derive(Debug, Args)]
pub struct ThresholdsShowArgs {
    #[arg(long, help = "Threshold rules JSON (default: built-in fibrosis_v1)")]
    pub thresholds: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[arg(long, help = "Tile prediction table")]
    pub predictions: PathBuf,

    #[arg(long)]
    pub thresholds: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub delimiter: Option<Delimiter>,

    #[arg(long, value_enum)]
    pub invalid_tiles: Option<InvalidTilePolicy>,
}
