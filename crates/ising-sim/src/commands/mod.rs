use std::error::Error;
use std::fs;
use std::path::Path;

use ising_mcmc::RunConfig;

pub mod anneal;
pub mod fit;
pub mod targets;

/// Loads a YAML run configuration and points its output at `out`.
fn load_config(path: &Path, out: &Path) -> Result<RunConfig, Box<dyn Error>> {
    let mut config = RunConfig::load(path)?;
    config.output.run_directory = Some(out.to_path_buf());
    Ok(config)
}

/// Copies the configuration next to the run artefacts.
fn archive_config(path: &Path, out: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(out)?;
    fs::copy(path, out.join("config.yaml"))?;
    Ok(())
}
