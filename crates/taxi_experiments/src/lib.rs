//! Parallel parameter sweeps over the taxi auction simulation.
//!
//! A [`ParameterSpace`] expands into one [`ParameterSet`] per combination of
//! fleet size, fare arrival rate, traffic volatility, bid policy and seed.
//! Each set runs as an independent [`taxi_core::runner::Simulation`] on the
//! rayon pool, and the finished runs are reduced to [`SimulationResult`] rows
//! that can be written out as CSV or JSON.
//!
//! # Quick Start
//!
//! ```no_run
//! use taxi_experiments::{export_to_csv, run_parallel_experiments, ParameterSpace};
//!
//! let space = ParameterSpace::grid()
//!     .taxi_counts(vec![5, 10, 20])
//!     .arrival_rates(vec![0.01, 0.02])
//!     .seeds(vec![1, 2, 3]);
//!
//! let parameter_sets = space.generate();
//! let results = run_parallel_experiments(&parameter_sets, None)?;
//! export_to_csv(&results, &parameter_sets, "sweep.csv")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod export;
pub mod metrics;
pub mod parameters;
pub mod runner;

pub use export::{export_to_csv, export_to_json, find_best_result_index};
pub use metrics::SimulationResult;
pub use parameters::{ParameterSet, ParameterSpace};
pub use runner::{run_parallel_experiments, run_parallel_experiments_with_progress, run_single_simulation};
