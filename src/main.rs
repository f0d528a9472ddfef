mod analysis;
mod config;
mod firm;
mod manager;
mod market;
mod record;
mod stats;
mod worker;

use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run all experiments of the configuration.
    Run {
        /// Run only this experiment.
        #[arg(long)]
        exp: Option<String>,
    },

    /// Analyze the data of finished experiments.
    Analyze,

    /// Remove data and results files.
    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.sim_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Run { exp } => mgr.run_experiments(exp.as_deref())?,
        Command::Analyze => mgr.analyze_experiments()?,
        Command::Clean => mgr.clean_experiments()?,
    }

    Ok(())
}
