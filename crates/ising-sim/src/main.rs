use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    anneal::{self, AnnealArgs},
    fit::{self, FitArgs},
    targets::{self, TargetsArgs},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "ising-sim", about = "Inverse Ising fitting and annealing CLI")]
struct Cli {
    /// Log filter used when `RUST_LOG` is unset (e.g. `debug`, `ising_mcmc=debug`).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit fields and couplings to target statistics by moment matching.
    Fit(FitArgs),
    /// Anneal random lattices under fitted parameters.
    Anneal(AnnealArgs),
    /// Reduce observed configurations to target statistics.
    Targets(TargetsArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Command::Fit(args) => fit::run(&args),
        Command::Anneal(args) => anneal::run(&args),
        Command::Targets(args) => targets::run(&args),
    }
}
