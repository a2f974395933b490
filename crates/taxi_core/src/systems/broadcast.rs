//! Dispatcher housekeeping before the allocation round, then the open-fare broadcast.
//!
//! In order: fares open too long expire (`Timeout`); assigned fares whose taxi
//! missed the pickup deadline are reopened and the taxi released; fares whose
//! origin cannot reach their destination expire (`Unroutable`). What is still
//! Open is published in [`OpenFareBroadcast`] for the bidding taxis.

use bevy_ecs::prelude::{Res, ResMut, Resource};
use tracing::{debug, warn};

use crate::clock::SimulationClock;
use crate::ecs::{FareId, NodeId};
use crate::events::{SimEventKind, TickEvents};
use crate::fares::{ExpiryReason, FareBoard, FareStatus};
use crate::grid::CityGrid;
use crate::routing::{RouteCache, Router};
use crate::scenario::SimConfig;
use crate::systems::resolution::{DispatchNotice, DispatchOutbox};
use crate::telemetry::SimTelemetry;
use crate::traffic::TrafficState;

/// An open fare as the taxis see it during bidding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenFare {
    pub id: FareId,
    pub origin: NodeId,
    pub destination: NodeId,
    pub price: f64,
    pub open_since: u64,
    /// Current route cost origin → destination.
    pub trip_cost: f64,
}

/// Open fares published for this tick's round, ascending by id.
#[derive(Debug, Default, Resource)]
pub struct OpenFareBroadcast {
    pub fares: Vec<OpenFare>,
}

#[allow(clippy::too_many_arguments)]
pub fn broadcast_system(
    clock: Res<SimulationClock>,
    config: Res<SimConfig>,
    grid: Res<CityGrid>,
    traffic: Res<TrafficState>,
    cache: Res<RouteCache>,
    mut board: ResMut<FareBoard>,
    mut outbox: ResMut<DispatchOutbox>,
    mut events: ResMut<TickEvents>,
    mut telemetry: ResMut<SimTelemetry>,
    mut broadcast: ResMut<OpenFareBroadcast>,
) {
    let now = clock.now();
    broadcast.fares.clear();

    let timed_out: Vec<FareId> = board
        .open_fares()
        .filter(|fare| fare.open_for(now) > config.max_fare_open_duration)
        .map(|fare| fare.id)
        .collect();
    for fare in timed_out {
        if board.expire(fare, ExpiryReason::Timeout, now).is_some() {
            debug!(tick = now, %fare, "fare expired unserved");
            telemetry.record_expiry(ExpiryReason::Timeout);
            events.push(
                now,
                SimEventKind::FareExpired {
                    fare,
                    reason: ExpiryReason::Timeout,
                },
            );
        }
    }

    let overdue: Vec<FareId> = board
        .active()
        .filter(|fare| {
            fare.status == FareStatus::Assigned
                && fare
                    .assigned_at
                    .is_some_and(|at| now.saturating_sub(at) > config.pickup_timeout_ticks)
        })
        .map(|fare| fare.id)
        .collect();
    for fare in overdue {
        let Some(taxi) = board.reopen(fare, now) else {
            continue;
        };
        debug!(tick = now, %fare, %taxi, "pickup timed out, fare reopened");
        telemetry.reassignments += 1;
        outbox.notices.push(DispatchNotice::Released { taxi, fare });
        events.push(now, SimEventKind::FareReassigned { fare, taxi });
    }

    let router = Router::new(&grid, &traffic).with_cache(&cache);
    let open: Vec<(FareId, NodeId, NodeId, f64, u64)> = board
        .open_fares()
        .map(|f| (f.id, f.origin, f.destination, f.price, f.open_since))
        .collect();
    for (id, origin, destination, price, open_since) in open {
        match router.shortest_path(origin, destination) {
            Ok(route) => broadcast.fares.push(OpenFare {
                id,
                origin,
                destination,
                price,
                open_since,
                trip_cost: route.total_cost,
            }),
            Err(err) => {
                warn!(tick = now, fare = %id, %err, "fare cannot be served");
                if board.expire(id, ExpiryReason::Unroutable, now).is_some() {
                    telemetry.record_expiry(ExpiryReason::Unroutable);
                    events.push(
                        now,
                        SimEventKind::FareExpired {
                            fare: id,
                            reason: ExpiryReason::Unroutable,
                        },
                    );
                }
            }
        }
    }
}
