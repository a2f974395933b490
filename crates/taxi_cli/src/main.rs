use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use taxi_core::error::SimError;
use taxi_core::grid::GridDefinition;
use taxi_core::runner::Simulation;
use taxi_core::scenario::SimConfig;
use taxi_experiments::{export_to_csv, export_to_json, find_best_result_index, ParameterSpace};
use tracing::info;

mod args;
mod logging;

use args::{Cli, Commands, RunArgs, ScenarioArgs, SweepArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref())?;

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Sweep(args) => sweep(args),
    }
}

fn load_scenario(args: &ScenarioArgs) -> Result<(GridDefinition, SimConfig)> {
    let grid = match &args.grid {
        Some(path) => GridDefinition::from_json_file(path)?,
        None => {
            let (width, height) = args.manhattan;
            GridDefinition::manhattan(width, height, 1.0)?
        }
    };
    let config = match &args.config {
        Some(path) => SimConfig::from_json_file(path)?,
        None => SimConfig::default(),
    };
    Ok((grid, config))
}

fn run(args: RunArgs) -> Result<()> {
    let (grid, mut config) = load_scenario(&args.scenario)?;
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(taxis) = args.taxis {
        config.taxi_start_nodes = None;
        config = config.with_taxi_count(taxis);
    }
    if let Some(ticks) = args.ticks {
        config = config.with_max_ticks(ticks);
    }

    let mut sim = Simulation::start(config, &grid).context("cannot start simulation")?;
    let mut events_out = match &args.events_out {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create '{}'", path.display()))?,
        )),
        None => None,
    };

    loop {
        let summary = match sim.step() {
            Ok(summary) => summary,
            Err(SimError::Halted) => break,
            Err(err) => return Err(err).context(format!("simulation failed at tick {}", sim.now())),
        };
        if let Some(out) = events_out.as_mut() {
            for event in &summary.events {
                serde_json::to_writer(&mut *out, event)?;
                out.write_all(b"\n")?;
            }
        }
    }
    if let Some(mut out) = events_out {
        out.flush()?;
    }

    let counts = sim.counts();
    let telemetry = sim.telemetry();
    info!(
        ticks = sim.now(),
        created = counts.fares.created,
        completed = counts.fares.completed,
        expired = counts.fares.expired,
        revenue = telemetry.revenue,
        "simulation finished"
    );
    println!(
        "{} ticks: {} fares created, {} completed, {} expired, {} still open or in flight; revenue {:.2}",
        sim.now(),
        counts.fares.created,
        counts.fares.completed,
        counts.fares.expired,
        counts.fares.open + counts.fares.assigned + counts.fares.picked_up,
        telemetry.revenue,
    );
    Ok(())
}

fn sweep(args: SweepArgs) -> Result<()> {
    let (grid, mut config) = load_scenario(&args.scenario)?;
    config.taxi_start_nodes = None;
    if let Some(ticks) = args.ticks {
        config = config.with_max_ticks(ticks);
    }

    let space = ParameterSpace::grid()
        .base_config(config)
        .street_grid(grid)
        .taxi_counts(args.taxis)
        .arrival_rates(args.arrival_rates)
        .seeds(args.seeds);
    let parameter_sets = space.generate();
    anyhow::ensure!(!parameter_sets.is_empty(), "the sweep has no valid parameter combinations");
    info!(runs = parameter_sets.len(), "starting sweep");

    let results = taxi_experiments::run_parallel_experiments_with_progress(
        &parameter_sets,
        args.threads,
        !args.no_progress,
    )?;

    write_output(&args.csv, |path| export_to_csv(&results, &parameter_sets, path))?;
    if let Some(json) = &args.json {
        write_output(json, |path| export_to_json(&results, path))?;
    }

    if let Some(best) = find_best_result_index(&results) {
        let result = &results[best];
        let set = &parameter_sets[best];
        println!(
            "best run: {} (seed {}), {} taxis, arrival rate {}: completion {:.1}%, mean pickup wait {:.1} ticks",
            result.experiment_id,
            result.seed,
            set.config.taxi_count,
            set.config.fare_arrival_rate,
            result.completion_rate * 100.0,
            result.avg_time_to_pickup,
        );
    }
    Ok(())
}

fn write_output<F>(path: &Path, export: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<(), Box<dyn std::error::Error>>,
{
    export(path).map_err(|err| anyhow::anyhow!("cannot write '{}': {err}", path.display()))?;
    info!(path = %path.display(), "results written");
    Ok(())
}
