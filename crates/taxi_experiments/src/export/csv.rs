use crate::metrics::SimulationResult;
use crate::parameters::ParameterSet;

pub(crate) fn export_to_csv_impl(
    results: &[SimulationResult],
    parameter_sets: &[ParameterSet],
    file: std::fs::File,
) -> Result<(), Box<dyn std::error::Error>> {
    if results.len() != parameter_sets.len() {
        return Err(format!(
            "Results length ({}) doesn't match parameter_sets length ({})",
            results.len(),
            parameter_sets.len()
        )
        .into());
    }

    let mut wtr = csv::Writer::from_writer(file);

    wtr.write_record([
        "experiment_id",
        "run_id",
        "seed",
        "taxi_count",
        "fare_arrival_rate",
        "traffic_volatility",
        "bid_policy",
        "max_ticks",
        "ticks",
        "fares_created",
        "fares_completed",
        "fares_expired",
        "fares_expired_timeout",
        "fares_expired_unroutable",
        "fares_unresolved",
        "completion_rate",
        "revenue",
        "avg_time_to_assign",
        "median_time_to_assign",
        "p90_time_to_assign",
        "avg_time_to_pickup",
        "median_time_to_pickup",
        "p90_time_to_pickup",
        "mean_taxi_utilization",
        "reassignments",
        "bids_submitted",
        "stale_bids",
    ])?;

    for (result, param_set) in results.iter().zip(parameter_sets) {
        let config = &param_set.config;
        wtr.write_record([
            param_set.experiment_id.clone(),
            param_set.run_id.to_string(),
            param_set.seed.to_string(),
            config.taxi_count.to_string(),
            config.fare_arrival_rate.to_string(),
            config.traffic_volatility.to_string(),
            param_set.bid_policy_label(),
            config.max_ticks.to_string(),
            result.ticks.to_string(),
            result.fares_created.to_string(),
            result.fares_completed.to_string(),
            result.fares_expired.to_string(),
            result.fares_expired_timeout.to_string(),
            result.fares_expired_unroutable.to_string(),
            result.fares_unresolved.to_string(),
            result.completion_rate.to_string(),
            result.revenue.to_string(),
            result.avg_time_to_assign.to_string(),
            result.median_time_to_assign.to_string(),
            result.p90_time_to_assign.to_string(),
            result.avg_time_to_pickup.to_string(),
            result.median_time_to_pickup.to_string(),
            result.p90_time_to_pickup.to_string(),
            result.mean_taxi_utilization.to_string(),
            result.reassignments.to_string(),
            result.bids_submitted.to_string(),
            result.stale_bids.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
