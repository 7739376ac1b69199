mod cli;
mod config;
mod convert;
mod inspect_cmd;
mod logging;
mod metric_cmd;

use std::process;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Command};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Metric(args) => metric_cmd::run(args),
        Command::Check(args) => inspect_cmd::check(args),
        Command::List(args) => inspect_cmd::list(args),
    }
}
