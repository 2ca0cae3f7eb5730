use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use ising_mcmc::manifest::{load_params, write_anneal_artifacts};
use ising_mcmc::{analysis, anneal_batch};
use tracing::info;

#[derive(Args, Debug)]
pub struct AnnealArgs {
    /// YAML configuration holding the annealing schedule.
    #[arg(long)]
    pub config: PathBuf,
    /// JSON parameters, typically `params.json` from a fit.
    #[arg(long)]
    pub params: PathBuf,
    /// Override for the configured number of annealing runs.
    #[arg(long)]
    pub samples: Option<usize>,
    /// Override for the configured master seed.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Output directory for samples and energy tables.
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &AnnealArgs) -> Result<(), Box<dyn Error>> {
    let mut config = super::load_config(&args.config, &args.out)?;
    super::archive_config(&args.config, &args.out)?;
    if let Some(samples) = args.samples {
        config.anneal.samples = samples;
    }
    config.validate_anneal()?;
    let params = load_params(&args.params)?;
    params.validate(config.shape()?)?;
    let seed = args.seed.unwrap_or(config.seed_policy.master_seed);

    let samples = anneal_batch(&params, &config.anneal.schedule, seed, config.anneal.samples)?;
    let manifest = write_anneal_artifacts(&args.out, &config, seed, &params, &samples)?;

    let levels = analysis::energy_histogram(&samples);
    info!(
        samples = samples.len(),
        distinct = levels.len(),
        lowest = levels.first().map(|level| level.energy),
        manifest = %manifest.display(),
        "annealing complete"
    );
    Ok(())
}
