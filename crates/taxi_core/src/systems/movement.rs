//! Movement: advances every moving taxi along its route for one tick.
//!
//! A moving taxi gets `tick_duration_mins` cost units of travel per tick under
//! current traffic. Reaching the pickup or the destination ends its tick. Taxis
//! standing at a junction re-plan when the traffic epoch has moved since their
//! route was planned. Pickups and drop-offs are reported to the dispatcher
//! through [`TripReports`]; the fare board itself is not touched here.

use bevy_ecs::prelude::{Query, Res, ResMut, Resource};
use tracing::{trace, warn};

use crate::clock::SimulationClock;
use crate::ecs::{FareId, Position, Taxi, TaxiDirectory, TaxiId, TaxiLedger, TaxiRoute, TaxiState};
use crate::events::{SimEventKind, TickEvents};
use crate::grid::CityGrid;
use crate::routing::{Route, RouteCache, Router};
use crate::scenario::SimConfig;
use crate::traffic::TrafficState;

/// Trip progress a taxi hands to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripReport {
    PickedUp { taxi: TaxiId, fare: FareId },
    Completed { taxi: TaxiId, fare: FareId },
}

#[derive(Debug, Default, Resource)]
pub struct TripReports {
    pub reports: Vec<TripReport>,
}

impl TripReports {
    pub fn drain(&mut self) -> Vec<TripReport> {
        std::mem::take(&mut self.reports)
    }
}

#[allow(clippy::too_many_arguments)]
pub fn movement_system(
    clock: Res<SimulationClock>,
    config: Res<SimConfig>,
    grid: Res<CityGrid>,
    traffic: Res<TrafficState>,
    cache: Res<RouteCache>,
    directory: Res<TaxiDirectory>,
    mut reports: ResMut<TripReports>,
    mut events: ResMut<TickEvents>,
    mut taxis: Query<(&mut Taxi, &mut Position, &mut TaxiRoute, &mut TaxiLedger)>,
) {
    let now = clock.now();
    let epoch = traffic.epoch();
    let cache: &RouteCache = &cache;
    let router = Router::new(&grid, &traffic).with_cache(cache);
    let budget = config.tick_duration_mins;

    for (id, entity) in directory.iter() {
        let Ok((mut taxi, mut position, mut route, mut ledger)) = taxis.get_mut(entity) else {
            continue;
        };

        let (job, target) = match (taxi.state, taxi.job) {
            (TaxiState::EnRouteToPickup, Some(job)) => (job, job.origin),
            (TaxiState::Transporting, Some(job)) => (job, job.destination),
            (TaxiState::Idle | TaxiState::Bidding, _) => {
                ledger.idle_ticks += 1;
                ledger.total_idle_ticks += 1;
                // A released taxi may still be finishing a street.
                if !route.is_finished() {
                    let step = router.advance(position.0, route.remaining_legs(), budget);
                    route.cursor += step.legs_completed;
                    if step.position != position.0 {
                        position.0 = step.position;
                        events.push(now, SimEventKind::TaxiMoved { taxi: id, position: step.position });
                    }
                }
                continue;
            }
            _ => continue,
        };

        let at_node = position.0.node().is_some();
        let stale = at_node && route.planned_epoch != epoch;
        if route.target() != target || stale {
            match router.plan_from(position.0, target) {
                Ok(planned) => *route = TaxiRoute::new(planned, epoch),
                Err(err) => {
                    warn!(tick = now, taxi = %id, %err, "taxi cannot reach its stop");
                    continue;
                }
            }
        }

        let step = router.advance(position.0, route.remaining_legs(), budget);
        route.cursor += step.legs_completed;
        if step.position != position.0 {
            position.0 = step.position;
            events.push(now, SimEventKind::TaxiMoved { taxi: id, position: step.position });
        }
        if !step.arrived || position.0.node() != Some(target) {
            continue;
        }

        match taxi.state {
            TaxiState::EnRouteToPickup => {
                trace!(tick = now, taxi = %id, fare = %job.fare, "pickup reached");
                reports.reports.push(TripReport::PickedUp { taxi: id, fare: job.fare });
                taxi.state = TaxiState::Transporting;
                match router.shortest_path(target, job.destination) {
                    Ok(planned) => *route = TaxiRoute::new(planned, epoch),
                    Err(err) => warn!(tick = now, taxi = %id, %err, "no route to destination"),
                }
            }
            TaxiState::Transporting => {
                trace!(tick = now, taxi = %id, fare = %job.fare, "destination reached");
                reports.reports.push(TripReport::Completed { taxi: id, fare: job.fare });
                ledger.earnings += job.price;
                if let Some(account) = ledger.account.as_mut() {
                    *account += job.price;
                }
                ledger.completed_fares += 1;
                ledger.idle_ticks = 0;
                taxi.state = TaxiState::Idle;
                taxi.job = None;
                *route = TaxiRoute::new(Route::stationary(target), epoch);
            }
            _ => {}
        }
    }
}
