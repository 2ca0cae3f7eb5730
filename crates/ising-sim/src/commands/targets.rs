use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use ising_core::TargetSource;
use ising_mcmc::manifest::{write_json, TARGETS_FILE};
use ising_mcmc::ObservedConfigurations;
use tracing::info;

#[derive(Args, Debug)]
pub struct TargetsArgs {
    /// JSON observed configurations (`rows`, `cols`, `configurations`).
    #[arg(long)]
    pub observations: PathBuf,
    /// Output directory receiving `targets.json`.
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &TargetsArgs) -> Result<(), Box<dyn Error>> {
    let observations = ObservedConfigurations::load(&args.observations)?;
    let statistics = observations.target_statistics()?;
    let path = args.out.join(TARGETS_FILE);
    write_json(&path, &statistics, "targets")?;
    info!(
        observations = observations.configurations.len(),
        path = %path.display(),
        "wrote target statistics"
    );
    Ok(())
}
