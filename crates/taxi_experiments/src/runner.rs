//! Parallel simulation execution using rayon.
//!
//! Every parameter set gets its own [`Simulation`]; runs share nothing, so
//! results depend only on their parameter set and not on thread scheduling.

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use taxi_core::error::{SimError, ValidationError};
use taxi_core::runner::Simulation;
use tracing::debug;

use crate::metrics::SimulationResult;
use crate::parameters::ParameterSet;

/// Runs one parameter set to its tick limit and extracts its metrics.
pub fn run_single_simulation(param_set: &ParameterSet) -> Result<SimulationResult, SimError> {
    let mut sim = Simulation::start(param_set.config.clone(), &param_set.grid)?;
    sim.run()?;
    debug!(
        experiment = %param_set.experiment_id,
        run = param_set.run_id,
        ticks = sim.now(),
        "experiment run finished"
    );
    Ok(SimulationResult::from_simulation(
        &sim,
        &param_set.experiment_id,
        param_set.run_id,
    ))
}

/// Runs every parameter set in parallel with a progress bar on stderr.
///
/// Results come back in the order of `parameter_sets`. `num_threads` of
/// `None` uses rayon's default pool size.
pub fn run_parallel_experiments(
    parameter_sets: &[ParameterSet],
    num_threads: Option<usize>,
) -> Result<Vec<SimulationResult>, SimError> {
    run_parallel_experiments_with_progress(parameter_sets, num_threads, true)
}

/// Like [`run_parallel_experiments`], with the progress bar optional.
///
/// The first failing run's error is returned; a pool that cannot be built
/// surfaces as a validation error.
pub fn run_parallel_experiments_with_progress(
    parameter_sets: &[ParameterSet],
    num_threads: Option<usize>,
    show_progress: bool,
) -> Result<Vec<SimulationResult>, SimError> {
    let total = parameter_sets.len();
    let pb = (show_progress && total > 0).then(|| progress_bar(total as u64));

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = num_threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder
        .build()
        .map_err(|err| ValidationError::new(format!("cannot build thread pool: {err}")))?;

    let results = pool.install(|| {
        parameter_sets
            .par_iter()
            .map(|param_set| {
                let result = run_single_simulation(param_set);
                if let Some(progress_bar) = &pb {
                    progress_bar.inc(1);
                }
                result
            })
            .collect::<Result<Vec<_>, _>>()
    });

    if let Some(progress_bar) = &pb {
        progress_bar.finish_with_message("Completed");
    }
    results
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParameterSpace;
    use taxi_core::grid::GridDefinition;
    use taxi_core::scenario::SimConfig;

    fn small_space() -> ParameterSpace {
        ParameterSpace::grid()
            .base_config(SimConfig::default().with_max_ticks(60))
            .street_grid(GridDefinition::manhattan(4, 4, 1.0).expect("4x4"))
            .taxi_counts(vec![2, 4])
            .seeds(vec![1, 2])
    }

    #[test]
    fn single_simulation_runs_to_tick_limit() {
        let sets = small_space().generate();
        let result = run_single_simulation(&sets[0]).expect("run");
        assert_eq!(result.ticks, 60);
        assert_eq!(result.taxi_count, 2);
        assert_eq!(result.experiment_id, sets[0].experiment_id);
    }

    #[test]
    fn parallel_results_match_sequential_runs_in_order() {
        let sets = small_space().generate();
        let parallel = run_parallel_experiments_with_progress(&sets, Some(2), false).expect("sweep");
        assert_eq!(parallel.len(), 4);
        for (set, result) in sets.iter().zip(&parallel) {
            assert_eq!(result.seed, set.seed);
            assert_eq!(result, &run_single_simulation(set).expect("run"));
        }
    }

    #[test]
    fn unbuildable_grid_fails_the_sweep() {
        let mut sets = small_space().generate();
        sets[1].grid = GridDefinition::default();
        let err = run_parallel_experiments_with_progress(&sets, None, false).unwrap_err();
        assert!(matches!(err, SimError::Validation(_)));
    }
}
