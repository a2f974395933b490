use bevy_ecs::prelude::World;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bidding::BidPolicyResource;
use crate::clock::{SimulationClock, TickLimit};
use crate::ecs::{GridPosition, NodeId, Position, Taxi, TaxiDirectory, TaxiId, TaxiLedger, TaxiRoute};
use crate::error::ValidationError;
use crate::events::TickEvents;
use crate::fares::FareBoard;
use crate::grid::CityGrid;
use crate::routing::{Route, RouteCache};
use crate::scenario::{SimConfig, SimRng};
use crate::systems::bid_collection::CollectedBids;
use crate::systems::broadcast::OpenFareBroadcast;
use crate::systems::movement::TripReports;
use crate::systems::resolution::{DispatchOutbox, FatalFault};
use crate::telemetry::SimTelemetry;
use crate::traffic::{TrafficProfile, TrafficState};

/// Validates `config` against `grid`, spawns the taxi fleet and inserts every
/// resource the simulation schedule reads.
///
/// Taxis start Idle at `taxi_start_nodes`, or at uniformly drawn junctions
/// when no start nodes are given. Placement draws come first from the run's
/// random stream, so the same seed always yields the same fleet.
pub fn build_world(world: &mut World, config: &SimConfig, grid: CityGrid) -> Result<(), ValidationError> {
    config.validate()?;
    for node in config.node_arrival_rates.keys() {
        if !grid.contains(*node) {
            return Err(ValidationError::new(format!(
                "arrival rate override names unknown node {node}"
            )));
        }
    }
    if let Some(nodes) = &config.taxi_start_nodes {
        if let Some(node) = nodes.iter().find(|n| !grid.contains(**n)) {
            return Err(ValidationError::new(format!("taxi start node {node} is not on the grid")));
        }
    }

    let mut rng = StdRng::seed_from_u64(config.random_seed);
    let node_ids: Vec<NodeId> = grid.node_ids().collect();
    let mut directory = TaxiDirectory::default();

    for i in 0..config.taxi_count {
        let id = TaxiId(i);
        let start = match &config.taxi_start_nodes {
            Some(nodes) => nodes[i as usize],
            None => node_ids[rng.gen_range(0..node_ids.len())],
        };
        let ledger = TaxiLedger {
            account: config.duty.enabled.then_some(config.duty.shift_budget),
            ..TaxiLedger::default()
        };
        let entity = world
            .spawn((
                Taxi::new(id),
                Position(GridPosition::Node { node: start }),
                TaxiRoute::new(Route::stationary(start), 0),
                ledger,
            ))
            .id();
        directory.0.insert(id, entity);
    }

    let traffic = TrafficState::new(
        &grid,
        config.traffic_settings(),
        TrafficProfile::from_kind(&config.traffic_profile),
    );

    world.insert_resource(directory);
    world.insert_resource(traffic);
    world.insert_resource(grid);
    world.insert_resource(RouteCache::new(config.route_cache_capacity));
    world.insert_resource(FareBoard::default());
    world.insert_resource(SimRng(rng));
    world.insert_resource(SimulationClock::default());
    world.insert_resource(TickLimit(config.max_ticks));
    world.insert_resource(TickEvents::default());
    world.insert_resource(SimTelemetry::default());
    world.insert_resource(BidPolicyResource::from_kind(config.bid_policy));
    world.insert_resource(OpenFareBroadcast::default());
    world.insert_resource(CollectedBids::default());
    world.insert_resource(DispatchOutbox::default());
    world.insert_resource(TripReports::default());
    world.insert_resource(FatalFault::default());
    world.insert_resource(config.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridDefinition;
    use crate::scenario::DutyConfig;

    fn grid() -> CityGrid {
        CityGrid::from_definition(&GridDefinition::manhattan(4, 4, 1.0).expect("4x4")).expect("grid")
    }

    fn start_nodes(world: &mut World) -> Vec<NodeId> {
        let directory: Vec<_> = world.resource::<TaxiDirectory>().iter().collect();
        directory
            .into_iter()
            .map(|(_, entity)| world.get::<Position>(entity).map(|p| p.0.anchor()))
            .collect::<Option<Vec<_>>>()
            .expect("positions")
    }

    #[test]
    fn same_seed_places_fleet_identically() {
        let config = SimConfig::default().with_seed(11).with_taxi_count(6);
        let mut a = World::new();
        let mut b = World::new();
        build_world(&mut a, &config, grid()).expect("world a");
        build_world(&mut b, &config, grid()).expect("world b");
        assert_eq!(start_nodes(&mut a), start_nodes(&mut b));
        assert_eq!(a.resource::<TaxiDirectory>().0.len(), 6);
    }

    #[test]
    fn explicit_start_nodes_are_honoured() {
        let config = SimConfig::default().with_taxi_start_nodes(vec![NodeId(3), NodeId(0)]);
        let mut world = World::new();
        build_world(&mut world, &config, grid()).expect("world");
        assert_eq!(start_nodes(&mut world), vec![NodeId(3), NodeId(0)]);
    }

    #[test]
    fn rejects_start_node_off_grid() {
        let config = SimConfig::default().with_taxi_start_nodes(vec![NodeId(99)]);
        let err = build_world(&mut World::new(), &config, grid()).unwrap_err();
        assert!(err.message().contains("99"));
    }

    #[test]
    fn rejects_override_for_unknown_node() {
        let config = SimConfig::default().with_node_arrival_rate(NodeId(42), 0.5);
        assert!(build_world(&mut World::new(), &config, grid()).is_err());
    }

    #[test]
    fn duty_cycle_opens_shift_accounts() {
        let config = SimConfig::default().with_taxi_count(2).with_duty(DutyConfig {
            enabled: true,
            shift_budget: 40.0,
            ..DutyConfig::default()
        });
        let mut world = World::new();
        build_world(&mut world, &config, grid()).expect("world");
        let accounts: Vec<_> = world
            .query::<&TaxiLedger>()
            .iter(&world)
            .map(|l| l.account)
            .collect();
        assert_eq!(accounts, vec![Some(40.0), Some(40.0)]);
    }
}
