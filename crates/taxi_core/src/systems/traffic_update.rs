use bevy_ecs::prelude::{Res, ResMut};
use tracing::debug;

use crate::clock::SimulationClock;
use crate::routing::RouteCache;
use crate::scenario::SimRng;
use crate::traffic::TrafficState;

/// Advances congestion for the new tick and drops cached routes when the epoch moves.
pub fn traffic_update_system(
    clock: Res<SimulationClock>,
    mut rng: ResMut<SimRng>,
    mut traffic: ResMut<TrafficState>,
    cache: Res<RouteCache>,
) {
    let now = clock.now();
    if traffic.tick(now, &mut rng.0) {
        debug!(tick = now, epoch = traffic.epoch(), "traffic epoch advanced");
        cache.sync_epoch(traffic.epoch());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::prelude::{Schedule, World};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::grid::{CityGrid, GridDefinition};
    use crate::traffic::{TrafficProfile, TrafficSettings};

    #[test]
    fn epoch_change_clears_route_cache() {
        let grid = CityGrid::from_definition(&GridDefinition::manhattan(2, 2, 1.0).expect("2x2")).expect("grid");
        let settings = TrafficSettings {
            volatility: 0.0,
            ..TrafficSettings::default()
        };
        let traffic = TrafficState::new(&grid, settings, TrafficProfile::rush_hour());
        let cache = RouteCache::new(8);
        crate::routing::Router::new(&grid, &traffic)
            .with_cache(&cache)
            .shortest_path(crate::ecs::NodeId(0), crate::ecs::NodeId(3))
            .expect("route");

        let mut world = World::new();
        let mut clock = SimulationClock::default();
        for _ in 0..420 {
            clock.advance();
        }
        world.insert_resource(clock);
        world.insert_resource(SimRng(StdRng::seed_from_u64(0)));
        world.insert_resource(traffic);
        world.insert_resource(cache);

        let mut schedule = Schedule::default();
        schedule.add_systems(traffic_update_system);
        schedule.run(&mut world);

        assert_eq!(world.resource::<TrafficState>().epoch(), 1);
        assert!(world.resource::<RouteCache>().is_empty());
    }
}
