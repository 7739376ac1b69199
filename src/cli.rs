use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// ICECAP sea-ice forecast verification.
#[derive(Parser)]
#[command(name = "icecap", version, about = "Sea-ice forecast verification engine")]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Compute one configured metric and save it as NetCDF.
    Metric(MetricArgs),
    /// Validate every configured plot and print its forecast sets.
    Check(ConfigArgs),
    /// List the configured plots.
    List(ConfigArgs),
}

/// Arguments for the `metric` subcommand.
#[derive(clap::Args)]
pub struct MetricArgs {
    /// Path to TOML configuration file.
    #[arg(short, long, default_value = "icecap.toml")]
    pub config: PathBuf,

    /// Plot id of the metric to compute.
    #[arg(short, long)]
    pub plot: String,

    /// Override the metric directory from config.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

/// Arguments for subcommands that only read the configuration.
#[derive(clap::Args)]
pub struct ConfigArgs {
    /// Path to TOML configuration file.
    #[arg(short, long, default_value = "icecap.toml")]
    pub config: PathBuf,
}
