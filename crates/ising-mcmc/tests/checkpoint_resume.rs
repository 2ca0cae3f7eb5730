use std::path::Path;

use ising_core::{LatticeShape, MomentStatistics, SchemaVersion};
use ising_mcmc::checkpoint::{checkpoint_path, SolverCheckpoint, CHECKPOINT_SCHEMA};
use ising_mcmc::{fit, resume, FitStatus, RunConfig};
use nalgebra::DMatrix;
use tempfile::tempdir;

fn targets() -> MomentStatistics {
    let shape = LatticeShape::new(2, 2).unwrap();
    MomentStatistics {
        magnetization: DMatrix::from_row_slice(2, 2, &[0.4, 0.1, -0.2, 0.3]),
        correlation: DMatrix::from_fn(shape.sites(), shape.sites(), |i, j| {
            if i == j {
                0.0
            } else {
                0.15
            }
        }),
    }
}

fn checkpoint_config(root: &Path) -> RunConfig {
    let mut config = RunConfig::default();
    config.lattice.rows = 2;
    config.lattice.cols = 2;
    config.sampling.replicas = 150;
    config.sampling.steps = 30;
    config.sampling.temperature = 1.0;
    config.solver.max_steps = 4;
    config.solver.eps1 = 0.0;
    config.solver.eps2 = Some(0.0);
    config.output.run_directory = Some(root.join("run"));
    config.checkpoint.interval = 1;
    config
}

#[test]
fn resume_from_checkpoint_matches_uninterrupted_run() {
    let dir = tempdir().unwrap();
    let config = checkpoint_config(dir.path());
    let full = fit(&config, 31, &targets(), None, None).unwrap();
    assert_eq!(full.status, FitStatus::MaxStepsExceeded);
    // No checkpoint follows the final iteration.
    assert_eq!(full.checkpoints.len(), 3);
    for path in &full.checkpoints {
        assert!(path.exists(), "missing checkpoint {}", path.display());
    }

    let run_dir = dir.path().join("run");
    let second = checkpoint_path(&run_dir.join("checkpoints"), 2);
    let payload = SolverCheckpoint::load(&second).unwrap();
    assert_eq!(payload.iteration, 2);
    assert_eq!(payload.log.len(), 2);
    assert_eq!(payload.master_seed, 31);

    let resumed = resume(&second, None).unwrap();
    assert_eq!(resumed.status, FitStatus::MaxStepsExceeded);
    assert_eq!(resumed.log.len(), full.log.len());
    for (a, b) in resumed.log.records().iter().zip(full.log.records()) {
        assert_eq!(a.iteration, b.iteration);
        assert!((a.tol1 - b.tol1).abs() < 1e-9);
        assert!((a.tol2 - b.tol2).abs() < 1e-9);
    }
    for (a, b) in resumed.params.fields.iter().zip(full.params.fields.iter()) {
        assert!((a - b).abs() < 1e-9);
    }
    for (a, b) in resumed
        .params
        .couplings
        .iter()
        .zip(full.params.couplings.iter())
    {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn retention_keeps_only_the_newest_checkpoints() {
    let dir = tempdir().unwrap();
    let mut config = checkpoint_config(dir.path());
    config.solver.max_steps = 6;
    config.checkpoint.max_to_keep = 2;
    let outcome = fit(&config, 8, &targets(), None, None).unwrap();
    let checkpoints = dir.path().join("run").join("checkpoints");
    assert_eq!(outcome.checkpoints.len(), 2);
    assert!(!checkpoint_path(&checkpoints, 1).exists());
    assert!(!checkpoint_path(&checkpoints, 3).exists());
    assert!(checkpoint_path(&checkpoints, 4).exists());
    assert!(checkpoint_path(&checkpoints, 5).exists());
}

#[test]
fn zero_interval_writes_no_checkpoints() {
    let dir = tempdir().unwrap();
    let mut config = checkpoint_config(dir.path());
    config.checkpoint.interval = 0;
    let outcome = fit(&config, 8, &targets(), None, None).unwrap();
    assert!(outcome.checkpoints.is_empty());
    assert!(!dir.path().join("run").join("checkpoints").exists());
}

#[test]
fn checkpoints_from_another_major_schema_are_refused() {
    let dir = tempdir().unwrap();
    let mut config = checkpoint_config(dir.path());
    config.solver.max_steps = 2;
    let outcome = fit(&config, 5, &targets(), None, None).unwrap();
    let path = &outcome.checkpoints[0];

    let mut payload = SolverCheckpoint::load(path).unwrap();
    assert_eq!(payload.schema_version, CHECKPOINT_SCHEMA);
    payload.schema_version = SchemaVersion::new(CHECKPOINT_SCHEMA.major + 1, 0, 0);
    payload.store(path).unwrap();

    let err = resume(path, None).unwrap_err();
    assert_eq!(err.info().code, "checkpoint-schema");
}
