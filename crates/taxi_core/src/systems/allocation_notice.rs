use bevy_ecs::prelude::{Query, Res, ResMut};
use tracing::warn;

use crate::clock::SimulationClock;
use crate::ecs::{Position, Taxi, TaxiDirectory, TaxiRoute, TaxiState};
use crate::grid::CityGrid;
use crate::routing::{Route, RouteCache, Router};
use crate::systems::resolution::{DispatchNotice, DispatchOutbox};
use crate::traffic::TrafficState;

/// Delivers dispatcher notices to taxis: winners head for the pickup, losers
/// go back to Idle, released taxis drop their fare.
pub fn allocation_notice_system(
    clock: Res<SimulationClock>,
    grid: Res<CityGrid>,
    traffic: Res<TrafficState>,
    cache: Res<RouteCache>,
    directory: Res<TaxiDirectory>,
    mut outbox: ResMut<DispatchOutbox>,
    mut taxis: Query<(&mut Taxi, &Position, &mut TaxiRoute)>,
) {
    let cache: &RouteCache = &cache;
    let router = Router::new(&grid, &traffic).with_cache(cache);
    let epoch = traffic.epoch();

    for notice in outbox.drain() {
        let Some(entity) = directory.get(notice.taxi()) else {
            continue;
        };
        let Ok((mut taxi, position, mut route)) = taxis.get_mut(entity) else {
            continue;
        };

        match notice {
            DispatchNotice::Won { job, .. } => {
                taxi.state = TaxiState::EnRouteToPickup;
                taxi.job = Some(job);
                match router.plan_from(position.0, job.origin) {
                    Ok(planned) => *route = TaxiRoute::new(planned, epoch),
                    Err(err) => {
                        warn!(tick = clock.now(), taxi = %taxi.id, %err, "no route to pickup");
                        *route = TaxiRoute::new(Route::stationary(position.0.anchor()), epoch);
                    }
                }
            }
            DispatchNotice::Lost { .. } => {
                if taxi.state == TaxiState::Bidding {
                    taxi.state = TaxiState::Idle;
                }
            }
            DispatchNotice::Released { .. } => {
                taxi.state = TaxiState::Idle;
                taxi.job = None;
                let anchor = position.0.anchor();
                let planned = router
                    .plan_from(position.0, anchor)
                    .unwrap_or_else(|_| Route::stationary(anchor));
                *route = TaxiRoute::new(planned, epoch);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::prelude::{Schedule, World};

    use crate::ecs::{FareId, FareJob, GridPosition, NodeId, TaxiId};
    use crate::routing::RouteLeg;
    use crate::test_helpers::{triangle_grid, triangle_traffic};

    fn world_with_taxi(position: GridPosition, state: TaxiState) -> World {
        let grid = triangle_grid();
        let traffic = triangle_traffic(&grid);
        let mut world = World::new();
        let mut taxi = Taxi::new(TaxiId(0));
        taxi.state = state;
        let entity = world
            .spawn((
                taxi,
                Position(position),
                TaxiRoute::new(Route::stationary(position.anchor()), 0),
            ))
            .id();
        let mut directory = TaxiDirectory::default();
        directory.0.insert(TaxiId(0), entity);
        world.insert_resource(directory);
        world.insert_resource(SimulationClock::default());
        world.insert_resource(traffic);
        world.insert_resource(grid);
        world.insert_resource(RouteCache::new(16));
        world.insert_resource(DispatchOutbox::default());
        world
    }

    fn deliver(world: &mut World, notice: DispatchNotice) {
        world.resource_mut::<DispatchOutbox>().notices.push(notice);
        let mut schedule = Schedule::default();
        schedule.add_systems(allocation_notice_system);
        schedule.run(world);
    }

    fn taxi(world: &mut World) -> (Taxi, TaxiRoute) {
        let (taxi, route) = world.query::<(&Taxi, &TaxiRoute)>().single(world);
        (*taxi, route.clone())
    }

    #[test]
    fn winner_plans_route_to_pickup() {
        let mut world = world_with_taxi(GridPosition::Node { node: NodeId(1) }, TaxiState::Bidding);
        let job = FareJob {
            fare: FareId(0),
            origin: NodeId(0),
            destination: NodeId(2),
            price: 5.0,
            assigned_at: 1,
        };
        deliver(&mut world, DispatchNotice::Won { taxi: TaxiId(0), job });

        let (taxi, route) = taxi(&mut world);
        assert_eq!(taxi.state, TaxiState::EnRouteToPickup);
        assert_eq!(taxi.job, Some(job));
        assert_eq!(route.route.nodes(), vec![NodeId(1), NodeId(0)]);
        assert!(world.resource::<DispatchOutbox>().notices.is_empty());
    }

    #[test]
    fn loser_returns_to_idle() {
        let mut world = world_with_taxi(GridPosition::Node { node: NodeId(2) }, TaxiState::Bidding);
        deliver(&mut world, DispatchNotice::Lost { taxi: TaxiId(0) });
        assert_eq!(taxi(&mut world).0.state, TaxiState::Idle);
    }

    #[test]
    fn released_taxi_mid_street_finishes_the_street() {
        let leg = RouteLeg {
            edge: crate::ecs::EdgeId(2),
            from: NodeId(0),
            to: NodeId(2),
        };
        let mut world = world_with_taxi(GridPosition::Edge { leg, progress: 0.5 }, TaxiState::EnRouteToPickup);
        deliver(
            &mut world,
            DispatchNotice::Released {
                taxi: TaxiId(0),
                fare: FareId(4),
            },
        );

        let (taxi, route) = taxi(&mut world);
        assert_eq!(taxi.state, TaxiState::Idle);
        assert_eq!(taxi.job, None);
        assert_eq!(route.remaining_legs(), &[leg]);
        assert_eq!(route.target(), NodeId(2));
    }
}
