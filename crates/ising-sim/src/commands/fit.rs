use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use ising_core::TargetSource;
use ising_mcmc::manifest::{load_params, load_statistics};
use ising_mcmc::{fit, resume, FitOutcome, ObservedConfigurations};
use tracing::info;

#[derive(Args, Debug)]
pub struct FitArgs {
    /// YAML configuration describing the lattice, sampler and solver.
    #[arg(long, required_unless_present = "resume")]
    pub config: Option<PathBuf>,
    /// JSON target statistics (`magnetization`, `correlation`).
    #[arg(long, conflicts_with = "observations")]
    pub targets: Option<PathBuf>,
    /// JSON observed configurations reduced to targets before fitting.
    #[arg(long)]
    pub observations: Option<PathBuf>,
    /// Optional starting parameters instead of the mean-field guess.
    #[arg(long)]
    pub initial: Option<PathBuf>,
    /// Override for the configured master seed.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Continue from a checkpoint file instead of starting a new fit.
    #[arg(long, conflicts_with_all = ["config", "targets", "observations", "initial"])]
    pub resume: Option<PathBuf>,
    /// Output directory for run artefacts. A resumed fit keeps the directory
    /// recorded in its checkpoint.
    #[arg(long, required_unless_present = "resume", conflicts_with = "resume")]
    pub out: Option<PathBuf>,
}

pub fn run(args: &FitArgs) -> Result<(), Box<dyn Error>> {
    let outcome = if let Some(checkpoint) = &args.resume {
        resume(checkpoint, None)?
    } else {
        let (Some(config_path), Some(out)) = (&args.config, &args.out) else {
            return Err("--config and --out are required unless --resume is set".into());
        };
        let config = super::load_config(config_path, out)?;
        super::archive_config(config_path, out)?;
        let source: Box<dyn TargetSource> = match (&args.targets, &args.observations) {
            (Some(path), _) => Box::new(load_statistics(path)?),
            (None, Some(path)) => Box::new(ObservedConfigurations::load(path)?),
            (None, None) => return Err("provide --targets or --observations".into()),
        };
        let initial = args.initial.as_deref().map(load_params).transpose()?;
        let seed = args.seed.unwrap_or(config.seed_policy.master_seed);
        fit(&config, seed, source.as_ref(), initial, None)?
    };
    report(&outcome);
    Ok(())
}

fn report(outcome: &FitOutcome) {
    let last = outcome.log.last();
    info!(
        status = ?outcome.status,
        iterations = outcome.iterations(),
        tol1 = last.map(|r| r.tol1),
        tol2 = last.map(|r| r.tol2),
        manifest = ?outcome.manifest_path,
        "fit complete"
    );
}
