//! Run a 10 × 10 city with 25 taxis for one simulated day and print completed fares.
//!
//! Run with: cargo run -p taxi_core --example scenario_run

use taxi_core::grid::GridDefinition;
use taxi_core::runner::Simulation;
use taxi_core::scenario::SimConfig;
use taxi_core::traffic::TrafficProfileKind;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    const TAXIS: u32 = 25;
    const TICKS: u64 = 1440;

    let config = SimConfig::default()
        .with_seed(123)
        .with_taxi_count(TAXIS)
        .with_fare_arrival_rate(0.005)
        .with_traffic_profile(TrafficProfileKind::RushHour)
        .with_max_ticks(TICKS);
    let mut sim = Simulation::start(config, &GridDefinition::manhattan(10, 10, 1.0)?)?;

    let summaries = sim.subscribe();
    sim.run()?;
    let busiest = summaries
        .try_iter()
        .max_by_key(|summary| summary.counts.taxis_transporting + summary.counts.taxis_en_route);

    let telemetry = sim.telemetry();
    let counts = sim.counts();
    println!("--- Scenario run ({TAXIS} taxis, {TICKS} ticks, seed 123) ---");
    println!("Fares created: {}", counts.fares.created);
    println!("Fares completed: {}", counts.fares.completed);
    println!(
        "Fares expired: {} (timeout {}, unroutable {})",
        counts.fares.expired, telemetry.expired_timeout, telemetry.expired_unroutable
    );
    println!("Revenue: {:.2}", telemetry.revenue);
    if let Some(summary) = busiest {
        println!(
            "Busiest tick: {} ({} taxis en route, {} transporting)",
            summary.tick, summary.counts.taxis_en_route, summary.counts.taxis_transporting
        );
    }

    const SAMPLE: usize = 10;
    println!("\nSample completed fares (first {SAMPLE}):");
    for (i, r) in telemetry.completed_fares.iter().take(SAMPLE).enumerate() {
        println!(
            "  {}  fare={} taxi={}  time_to_assign={}  time_to_pickup={}  trip_duration={}  price={:.2}",
            i + 1,
            r.fare,
            r.taxi,
            r.time_to_assign(),
            r.time_to_pickup(),
            r.trip_duration(),
            r.price,
        );
    }
    Ok(())
}
