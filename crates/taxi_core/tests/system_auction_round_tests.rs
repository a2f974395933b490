mod support;

use bevy_ecs::prelude::{Schedule, World};
use bevy_ecs::schedule::IntoSystemConfigs;
use support::schedule::ScheduleRunner;
use support::world::TestWorldBuilder;
use taxi_core::bidding::{Bid, BidPolicyKind, BidPolicyResource};
use taxi_core::clock::SimulationClock;
use taxi_core::ecs::{FareId, TaxiId};
use taxi_core::events::{SimEventKind, TickEvents};
use taxi_core::grid::GridDefinition;
use taxi_core::systems::bid_collection::{bid_collection_system, CollectedBids};
use taxi_core::systems::broadcast::broadcast_system;
use taxi_core::systems::resolution::resolution_system;
use taxi_core::telemetry::SimTelemetry;
use taxi_core::test_helpers::quiet_config;

fn collect(world: &mut World) -> Vec<Bid> {
    world.resource_mut::<SimulationClock>().advance();
    let mut schedule = Schedule::default();
    schedule.add_systems((broadcast_system, bid_collection_system).chain());
    schedule.run(world);
    world.resource::<CollectedBids>().bids.clone()
}

fn resolve(world: &mut World) -> Vec<(FareId, TaxiId, f64)> {
    let mut schedule = Schedule::default();
    schedule.add_systems(resolution_system);
    schedule.run(world);
    world
        .resource_mut::<TickEvents>()
        .take()
        .into_iter()
        .filter_map(|e| match e.kind {
            SimEventKind::FareAssigned { fare, taxi, cost } => Some((fare, taxi, cost)),
            _ => None,
        })
        .collect()
}

fn grid_world() -> TestWorldBuilder {
    TestWorldBuilder::new()
        .with_grid(GridDefinition::manhattan(4, 4, 1.0).expect("4x4"))
        .with_config(quiet_config())
}

#[test]
fn every_available_taxi_bids_in_id_order() {
    let mut world = grid_world()
        .with_taxis_at(&[15, 0, 5])
        .with_fare(1, 2, 5.0)
        .build();
    let bids = collect(&mut world);

    let bidders: Vec<_> = bids.iter().map(|b| b.taxi).collect();
    assert_eq!(bidders, vec![TaxiId(0), TaxiId(1), TaxiId(2)]);
    let seqs: Vec<_> = bids.iter().map(|b| b.stamp.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2]);
    // Taxi 0 at the far corner: 5 blocks to the pickup, 1 for the trip.
    assert_eq!(bids[0].cost, 6.0);
    assert_eq!(bids[1].cost, 2.0);
    assert_eq!(world.resource::<SimTelemetry>().bids_submitted, 3);
}

#[test]
fn winning_bid_is_lowest_for_its_fare() {
    let mut world = grid_world()
        .with_taxis_at(&[15, 0, 5, 10])
        .with_fare(1, 2, 5.0)
        .with_fare(14, 13, 5.0)
        .build();
    let bids = collect(&mut world);
    let assigned = resolve(&mut world);

    assert_eq!(assigned.len(), 2);
    let mut winners = std::collections::HashSet::new();
    for (fare, taxi, cost) in &assigned {
        assert!(winners.insert(*taxi));
        let cheapest = bids
            .iter()
            .filter(|b| b.fare == *fare)
            .map(|b| b.cost)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(*cost, cheapest);
    }
}

#[test]
fn taxi_best_for_two_fares_keeps_only_its_cheapest() {
    // One taxi between both pickups, the other far away.
    let mut world = grid_world()
        .with_taxis_at(&[1, 15])
        .with_fare(0, 4, 5.0)
        .with_fare(2, 3, 5.0)
        .build();
    collect(&mut world);
    let assigned = resolve(&mut world);

    // Taxi 0 prices fare 0 at 1 + 1 and fare 1 at 1 + 1; the stamp decides for fare 0.
    assert_eq!(assigned[0], (FareId(0), TaxiId(0), 2.0));
    assert_eq!(assigned[1].0, FareId(1));
    assert_eq!(assigned[1].1, TaxiId(1));
    assert_eq!(world.resource::<SimTelemetry>().contested_passes, 1);
}

#[test]
fn pickup_radius_policy_keeps_far_taxis_out() {
    let mut world = grid_world()
        .with_taxis_at(&[15, 0])
        .with_fare(1, 2, 5.0)
        .build();
    world.insert_resource(BidPolicyResource::from_kind(BidPolicyKind::PickupRadius {
        max_pickup_cost: 2.0,
    }));
    let bids = collect(&mut world);
    assert_eq!(bids.len(), 1);
    assert_eq!(bids[0].taxi, TaxiId(1));
}

#[test]
fn full_schedule_serves_seeded_fares() {
    let mut world = grid_world()
        .with_taxis_at(&[0, 15])
        .with_fare(3, 12, 5.0)
        .build();
    let mut runner = ScheduleRunner::new();
    let events = runner.run_ticks(&mut world, 12);
    assert!(events
        .iter()
        .any(|e| matches!(e.kind, SimEventKind::FareCompleted { fare: FareId(0), .. })));
}
