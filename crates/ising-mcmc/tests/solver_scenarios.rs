use ising_core::{IsingError, LatticeShape, MomentStatistics};
use ising_mcmc::statistics::initial_params;
use ising_mcmc::{fit, CancelToken, ClampConfig, FitStatus, RunConfig, SchedulePolicy};
use nalgebra::DMatrix;

fn small_config(rows: usize, cols: usize) -> RunConfig {
    let mut config = RunConfig::default();
    config.lattice.rows = rows;
    config.lattice.cols = cols;
    config.sampling.replicas = 200;
    config.sampling.steps = 40;
    config.sampling.temperature = 1.0;
    config
}

fn uniform_targets(shape: LatticeShape, m: f64, c: f64) -> MomentStatistics {
    let n = shape.sites();
    MomentStatistics {
        magnetization: DMatrix::from_element(shape.rows(), shape.cols(), m),
        correlation: DMatrix::from_fn(n, n, |i, j| if i == j { 0.0 } else { c }),
    }
}

#[test]
fn independent_sites_recover_their_fields() {
    let shape = LatticeShape::new(2, 2).unwrap();
    let mut config = small_config(2, 2);
    config.sampling.temperature = 2.0;
    config.sampling.replicas = 4000;
    config.sampling.steps = 100;
    config.solver.eps1 = 0.12;
    config.solver.eps2 = Some(0.3);
    config.solver.max_steps = 200;

    let targets = uniform_targets(shape, 0.5, 0.25);
    let outcome = fit(&config, 2024, &targets, None, None).unwrap();

    assert_eq!(outcome.status, FitStatus::Converged);
    // Without couplings each site solves tanh(h / T) = 0.5.
    let expected = 2.0 * 0.5f64.atanh();
    for h in outcome.params.fields.iter() {
        assert!((h - expected).abs() < 0.3, "field {h} vs {expected}");
    }
    for i in 0..4 {
        for j in 0..4 {
            assert!(outcome.params.couplings[(i, j)].abs() < 0.25);
        }
    }
    let last = outcome.log.last().unwrap();
    assert!(last.tol1 < 0.12 && last.tol2 < 0.3);
}

#[test]
fn saturated_targets_are_clamped_to_finite_fields() {
    let shape = LatticeShape::new(1, 2).unwrap();
    let targets = uniform_targets(shape, 1.0, 1.0);
    let params = initial_params(&targets.magnetization, &ClampConfig::default()).unwrap();
    for h in params.fields.iter() {
        assert!(h.is_finite());
        assert!((h - 0.999f64.atanh()).abs() < 1e-9);
    }
    assert!((0.999f64.atanh() - 3.8002).abs() < 1e-4);

    let mut config = small_config(1, 2);
    config.solver.max_steps = 1;
    config.solver.eps1 = 1e9;
    config.solver.eps2 = Some(1e9);
    let outcome = fit(&config, 1, &targets, None, None).unwrap();
    assert!(outcome.targets.magnetization.iter().all(|&m| m == 0.999));
    assert!(outcome.params.fields.iter().all(|h| h.is_finite()));
}

#[test]
fn disabled_clamp_reports_numeric_degeneracy() {
    let shape = LatticeShape::new(1, 2).unwrap();
    let targets = uniform_targets(shape, 1.0, 1.0);
    let mut config = small_config(1, 2);
    config.solver.clamp.enabled = false;
    let err = fit(&config, 1, &targets, None, None).unwrap_err();
    assert!(matches!(err, IsingError::Numeric(_)));
}

#[test]
fn empty_ensemble_is_a_configuration_error() {
    let shape = LatticeShape::new(2, 2).unwrap();
    let targets = uniform_targets(shape, 0.1, 0.0);

    let mut config = small_config(2, 2);
    config.sampling.replicas = 0;
    assert!(fit(&config, 1, &targets, None, None).unwrap_err().is_config());

    let mut config = small_config(2, 2);
    config.sampling.steps = 0;
    assert!(fit(&config, 1, &targets, None, None).unwrap_err().is_config());
}

#[test]
fn mismatched_targets_are_rejected() {
    let targets = uniform_targets(LatticeShape::new(3, 3).unwrap(), 0.1, 0.0);
    let config = small_config(2, 2);
    assert!(fit(&config, 1, &targets, None, None).unwrap_err().is_config());
}

#[test]
fn single_iteration_cap_with_loose_thresholds_converges() {
    let shape = LatticeShape::new(2, 2).unwrap();
    let targets = uniform_targets(shape, 0.2, 0.05);
    let mut config = small_config(2, 2);
    config.solver.max_steps = 1;
    config.solver.eps1 = 1e9;
    config.solver.eps2 = Some(1e9);
    let outcome = fit(&config, 3, &targets, None, None).unwrap();
    assert_eq!(outcome.status, FitStatus::Converged);
    assert_eq!(outcome.log.len(), 1);
    assert_eq!(outcome.iterations(), 1);
    assert!(outcome.sampled.is_some());
}

#[test]
fn fit_runs_with_an_unusable_anneal_schedule() {
    let shape = LatticeShape::new(2, 2).unwrap();
    let targets = uniform_targets(shape, 0.2, 0.05);
    let mut config = small_config(2, 2);
    config.solver.max_steps = 1;
    config.solver.eps1 = 1e9;
    config.solver.eps2 = Some(1e9);
    config.anneal.schedule = SchedulePolicy::Linear {
        start: 1.0,
        floor: 0.0,
        decrement: 1e-7,
        steps: 10,
        widened: None,
    };
    let outcome = fit(&config, 3, &targets, None, None).unwrap();
    assert_eq!(outcome.status, FitStatus::Converged);
}

#[test]
fn single_iteration_cap_with_strict_thresholds_stops() {
    let shape = LatticeShape::new(2, 2).unwrap();
    let targets = uniform_targets(shape, 0.2, 0.05);
    let mut config = small_config(2, 2);
    config.solver.max_steps = 1;
    config.solver.eps1 = 0.0;
    config.solver.eps2 = Some(0.0);
    let outcome = fit(&config, 3, &targets, None, None).unwrap();
    assert_eq!(outcome.status, FitStatus::MaxStepsExceeded);
    assert_eq!(outcome.log.len(), 1);
}

#[test]
fn iteration_count_never_exceeds_the_cap() {
    let shape = LatticeShape::new(2, 2).unwrap();
    let targets = uniform_targets(shape, 0.3, 0.1);
    let mut config = small_config(2, 2);
    config.solver.max_steps = 5;
    config.solver.eps1 = 0.0;
    config.solver.eps2 = Some(0.0);
    let outcome = fit(&config, 9, &targets, None, None).unwrap();
    assert_eq!(outcome.status, FitStatus::MaxStepsExceeded);
    let iterations: Vec<usize> = outcome.log.records().iter().map(|r| r.iteration).collect();
    assert_eq!(iterations, vec![1, 2, 3, 4, 5]);
}

#[test]
fn couplings_stay_symmetric_with_zero_diagonal() {
    let shape = LatticeShape::new(2, 3).unwrap();
    let mut targets = uniform_targets(shape, 0.1, 0.2);
    targets.correlation[(0, 5)] = 0.6;
    targets.correlation[(5, 0)] = 0.6;
    let mut config = small_config(2, 3);
    config.solver.max_steps = 6;
    config.solver.eps1 = 0.0;
    config.solver.eps2 = Some(0.0);
    let outcome = fit(&config, 4, &targets, None, None).unwrap();
    let j = &outcome.params.couplings;
    for i in 0..6 {
        assert_eq!(j[(i, i)], 0.0);
        for k in 0..6 {
            assert_eq!(j[(i, k)], j[(k, i)]);
        }
    }
}

#[test]
fn same_seed_reproduces_the_fit_across_thread_counts() {
    let shape = LatticeShape::new(2, 2).unwrap();
    let targets = uniform_targets(shape, 0.3, 0.1);
    let mut config = small_config(2, 2);
    config.solver.max_steps = 4;
    config.solver.eps1 = 0.0;
    config.solver.eps2 = Some(0.0);
    config.sampling.threads = 1;
    let first = fit(&config, 77, &targets, None, None).unwrap();
    config.sampling.threads = 3;
    let second = fit(&config, 77, &targets, None, None).unwrap();
    assert_eq!(first.params, second.params);
    assert_eq!(first.log, second.log);
}

#[test]
fn cancellation_before_the_first_iteration_stops_immediately() {
    let shape = LatticeShape::new(2, 2).unwrap();
    let targets = uniform_targets(shape, 0.3, 0.1);
    let config = small_config(2, 2);
    let token = CancelToken::new();
    token.cancel();
    let outcome = fit(&config, 5, &targets, None, Some(&token)).unwrap();
    assert_eq!(outcome.status, FitStatus::Cancelled);
    assert!(outcome.log.is_empty());
    assert!(outcome.sampled.is_none());
    assert!((outcome.params.fields[(0, 0)] - 0.3f64.atanh()).abs() < 1e-12);
}
