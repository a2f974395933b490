use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "taxi-sim",
    about = "Autonomous taxi fleet simulation with per-tick fare auctions",
    long_about = "Runs the grid-city taxi simulation once with an event log,\n\
                  or sweeps fleet size, demand and seeds in parallel."
)]
pub struct Cli {
    /// Log filter directive (e.g. `info`, `debug`, `taxi_core=trace`); overrides RUST_LOG
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one simulation to its tick limit
    Run(RunArgs),
    /// Run a parameter sweep in parallel and export the metrics
    Sweep(SweepArgs),
}

/// Where the street grid and base configuration come from.
#[derive(Debug, Args)]
pub struct ScenarioArgs {
    /// Street grid JSON file (`{"nodes": [...], "edges": [...]}`)
    #[arg(long, conflicts_with = "manhattan")]
    pub grid: Option<PathBuf>,

    /// Generated rectangular grid, WIDTHxHEIGHT junctions with unit block cost
    #[arg(long, value_parser = parse_dimensions, default_value = "8x8")]
    pub manhattan: (u32, u32),

    /// Simulation configuration JSON file; missing fields take their defaults
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,

    /// Random seed
    #[arg(long, env = "TAXI_SIM_SEED")]
    pub seed: Option<u64>,

    /// Fleet size
    #[arg(long)]
    pub taxis: Option<u32>,

    /// Number of ticks to simulate
    #[arg(long)]
    pub ticks: Option<u64>,

    /// Write every event as one JSON object per line
    #[arg(long)]
    pub events_out: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SweepArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,

    /// Fleet sizes to sweep
    #[arg(long, value_delimiter = ',', default_values_t = [5u32, 10, 20])]
    pub taxis: Vec<u32>,

    /// Per-node fare arrival probabilities to sweep
    #[arg(long, value_delimiter = ',', default_values_t = [0.01f64, 0.02])]
    pub arrival_rates: Vec<f64>,

    /// Seeds to repeat every combination with
    #[arg(long, value_delimiter = ',', default_values_t = [1u64, 2, 3])]
    pub seeds: Vec<u64>,

    /// Ticks per run
    #[arg(long)]
    pub ticks: Option<u64>,

    /// Worker threads; defaults to one per core
    #[arg(long)]
    pub threads: Option<usize>,

    /// CSV output file
    #[arg(long, default_value = "sweep_results.csv")]
    pub csv: PathBuf,

    /// Optional JSON output file
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

fn parse_dimensions(raw: &str) -> Result<(u32, u32), String> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{raw}'"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| format!("'{part}' is not a positive integer"))
    };
    Ok((parse(w)?, parse(h)?))
}
