//! Metrics extraction from finished simulations.

use serde::Serialize;
use taxi_core::runner::Simulation;

/// Aggregated metrics from a single simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub experiment_id: String,
    pub run_id: usize,
    pub seed: u64,
    /// Ticks actually simulated.
    pub ticks: u64,
    pub taxi_count: u32,
    pub fares_created: u64,
    pub fares_completed: u64,
    pub fares_expired: u64,
    /// Expired because no taxi won them in time.
    pub fares_expired_timeout: u64,
    /// Expired because the destination could not be reached.
    pub fares_expired_unroutable: u64,
    /// Fares still open or in flight when the run ended.
    pub fares_unresolved: u64,
    /// Completed / (completed + expired).
    pub completion_rate: f64,
    pub revenue: f64,
    pub avg_time_to_assign: f64,
    pub median_time_to_assign: f64,
    pub p90_time_to_assign: f64,
    pub avg_time_to_pickup: f64,
    pub median_time_to_pickup: f64,
    pub p90_time_to_pickup: f64,
    /// Mean share of ticks a taxi spent neither idle nor bidding.
    pub mean_taxi_utilization: f64,
    pub reassignments: u64,
    pub bids_submitted: u64,
    pub stale_bids: u64,
}

impl SimulationResult {
    /// Reads metrics off a simulation that has stopped stepping.
    pub fn from_simulation(sim: &Simulation, experiment_id: &str, run_id: usize) -> Self {
        let telemetry = sim.telemetry();
        let counts = sim.counts().fares;
        let ticks = sim.now();

        let assign_waits: Vec<u64> = telemetry.completed_fares.iter().map(|r| r.time_to_assign()).collect();
        let pickup_waits: Vec<u64> = telemetry.completed_fares.iter().map(|r| r.time_to_pickup()).collect();
        let (avg_time_to_assign, median_time_to_assign, p90_time_to_assign) = calculate_stats(&assign_waits);
        let (avg_time_to_pickup, median_time_to_pickup, p90_time_to_pickup) = calculate_stats(&pickup_waits);

        let resolved = counts.completed + counts.expired;
        let completion_rate = if resolved > 0 {
            counts.completed as f64 / resolved as f64
        } else {
            0.0
        };

        let taxis = sim.taxis();
        let mean_taxi_utilization = if taxis.is_empty() || ticks == 0 {
            0.0
        } else {
            taxis
                .iter()
                .map(|t| ticks.saturating_sub(t.total_idle_ticks) as f64 / ticks as f64)
                .sum::<f64>()
                / taxis.len() as f64
        };

        Self {
            experiment_id: experiment_id.to_string(),
            run_id,
            seed: sim.config().random_seed,
            ticks,
            taxi_count: sim.config().taxi_count,
            fares_created: counts.created,
            fares_completed: counts.completed,
            fares_expired: counts.expired,
            fares_expired_timeout: telemetry.expired_timeout,
            fares_expired_unroutable: telemetry.expired_unroutable,
            fares_unresolved: counts.open + counts.assigned + counts.picked_up,
            completion_rate,
            revenue: telemetry.revenue,
            avg_time_to_assign,
            median_time_to_assign,
            p90_time_to_assign,
            avg_time_to_pickup,
            median_time_to_pickup,
            p90_time_to_pickup,
            mean_taxi_utilization,
            reassignments: telemetry.reassignments,
            bids_submitted: telemetry.bids_submitted,
            stale_bids: telemetry.stale_bids,
        }
    }
}

/// Mean, median and 90th percentile of tick counts; all zero when empty.
pub fn calculate_stats(values: &[u64]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0);
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let n = sorted.len();
    let avg = sorted.iter().sum::<u64>() as f64 / n as f64;
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0
    } else {
        sorted[n / 2] as f64
    };
    let p90_idx = ((n - 1) as f64 * 0.9) as usize;
    let p90 = sorted[p90_idx.min(n - 1)] as f64;

    (avg, median, p90)
}
