//! Fare generator: Bernoulli arrivals per junction.
//!
//! Junctions are visited in ascending id order. Each draws once for an arrival
//! and, on success, once more for a destination among the junctions it can reach.
//! A junction that already has an Open fare waiting gets no second one.

use bevy_ecs::prelude::{Query, Res, ResMut};
use rand::Rng;
use tracing::{trace, warn};

use crate::clock::SimulationClock;
use crate::ecs::{Taxi, TaxiState};
use crate::events::{SimEventKind, TickEvents};
use crate::fares::FareBoard;
use crate::grid::CityGrid;
use crate::routing::{reachable_from, RouteCache, Router};
use crate::scenario::{SimConfig, SimRng};
use crate::traffic::TrafficState;

#[allow(clippy::too_many_arguments)]
pub fn fare_generation_system(
    clock: Res<SimulationClock>,
    config: Res<SimConfig>,
    grid: Res<CityGrid>,
    traffic: Res<TrafficState>,
    cache: Res<RouteCache>,
    mut rng: ResMut<SimRng>,
    mut board: ResMut<FareBoard>,
    mut events: ResMut<TickEvents>,
    taxis: Query<&Taxi>,
) {
    let now = clock.now();
    let on_duty = taxis
        .iter()
        .filter(|taxi| taxi.state != TaxiState::OffDuty)
        .count();
    let cache: &RouteCache = &cache;
    let router = Router::new(&grid, &traffic).with_cache(cache);

    for origin in grid.node_ids() {
        let draw: f64 = rng.0.gen();
        if draw >= config.arrival_rate_at(origin) || board.has_open_fare_at(origin) {
            continue;
        }

        let reachable = reachable_from(&grid, Some(cache), origin);
        let candidates: Vec<_> = reachable.iter().copied().filter(|n| *n != origin).collect();
        if candidates.is_empty() {
            continue;
        }
        let destination = candidates[rng.0.gen_range(0..candidates.len())];

        let route = match router.shortest_path(origin, destination) {
            Ok(route) => route,
            Err(err) => {
                warn!(%err, "discarding fare without a route");
                continue;
            }
        };
        let price = config
            .pricing
            .quote(route.total_cost, board.open_count() + 1, on_duty);
        let fare = board.create(origin, destination, price, route.total_cost, now);
        trace!(tick = now, %fare, %origin, %destination, price, "fare created");
        events.push(
            now,
            SimEventKind::FareCreated {
                fare,
                origin,
                destination,
                price,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::prelude::{Schedule, World};

    use crate::ecs::NodeId;
    use crate::grid::GridDefinition;
    use crate::scenario::build_world;

    fn world_with(config: SimConfig) -> World {
        let grid = CityGrid::from_definition(&GridDefinition::manhattan(3, 3, 1.0).expect("3x3")).expect("grid");
        let mut world = World::new();
        build_world(&mut world, &config, grid).expect("world");
        world.resource_mut::<SimulationClock>().advance();
        world
    }

    fn run(world: &mut World) {
        let mut schedule = Schedule::default();
        schedule.add_systems(fare_generation_system);
        schedule.run(world);
    }

    #[test]
    fn certain_arrival_creates_one_fare_per_node() {
        let config = SimConfig::default().with_fare_arrival_rate(1.0).with_taxi_count(2);
        let mut world = world_with(config);
        run(&mut world);

        let board = world.resource::<FareBoard>();
        assert_eq!(board.open_count(), 9);
        for fare in board.open_fares() {
            assert_ne!(fare.origin, fare.destination);
            assert!(fare.price >= 2.5);
            assert_eq!(fare.created_at, 1);
        }
        assert_eq!(world.resource::<TickEvents>().events().len(), 9);
    }

    #[test]
    fn node_with_open_fare_is_skipped() {
        let config = SimConfig::default().with_fare_arrival_rate(1.0);
        let mut world = world_with(config);
        run(&mut world);
        run(&mut world);
        assert_eq!(world.resource::<FareBoard>().open_count(), 9);
    }

    #[test]
    fn zero_rate_with_override_only_spawns_at_that_node() {
        let config = SimConfig::default()
            .with_fare_arrival_rate(0.0)
            .with_node_arrival_rate(NodeId(4), 1.0);
        let mut world = world_with(config);
        run(&mut world);
        let origins: Vec<NodeId> = world
            .resource::<FareBoard>()
            .open_fares()
            .map(|f| f.origin)
            .collect();
        assert_eq!(origins, vec![NodeId(4)]);
    }
}
