//! Taxi bidding against the open-fare broadcast.
//!
//! Every available taxi computes one shortest-path tree from where it stands and
//! prices each open fare as pickup cost plus trip cost. The trees are built in
//! parallel from a read-only snapshot; bids are then stamped in taxi-id order.

use bevy_ecs::prelude::{Entity, Query, Res, ResMut, Resource};
use rayon::prelude::*;
use tracing::trace;

use crate::bidding::{Bid, BidContext, BidPolicy, BidPolicyResource, BidStamp};
use crate::clock::SimulationClock;
use crate::ecs::{FareId, GridPosition, Position, Taxi, TaxiDirectory, TaxiId, TaxiState};
use crate::grid::CityGrid;
use crate::routing::Router;
use crate::scenario::SimConfig;
use crate::systems::broadcast::{OpenFare, OpenFareBroadcast};
use crate::telemetry::SimTelemetry;
use crate::traffic::TrafficState;

/// Bids submitted in the current round, in submission order.
#[derive(Debug, Default, Resource)]
pub struct CollectedBids {
    pub bids: Vec<Bid>,
}

impl CollectedBids {
    pub fn take(&mut self) -> Vec<Bid> {
        std::mem::take(&mut self.bids)
    }
}

struct Offers {
    entity: Entity,
    taxi: TaxiId,
    offers: Vec<(FareId, f64)>,
}

/// Prices every open fare this taxi can reach and keeps the ones its policy accepts.
#[allow(clippy::too_many_arguments)]
fn compute_offers(
    router: Router<'_>,
    policy: &dyn BidPolicy,
    fares: &[OpenFare],
    taxi: TaxiId,
    position: GridPosition,
    now: u64,
    max_open_duration: u64,
    tick_duration_mins: f64,
) -> Vec<(FareId, f64)> {
    let to_anchor = router.remaining_on_leg(position);
    let tree = router.tree(position.anchor());
    fares
        .iter()
        .filter_map(|fare| {
            let pickup = tree.cost_to(fare.origin)?;
            let ctx = BidContext {
                taxi,
                fare: fare.id,
                origin: fare.origin,
                destination: fare.destination,
                price: fare.price,
                pickup_cost: to_anchor + pickup,
                trip_cost: fare.trip_cost,
                now,
                open_since: fare.open_since,
                max_open_duration,
                tick_duration_mins,
            };
            policy
                .participate(&ctx)
                .then_some((fare.id, ctx.total_cost()))
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
pub fn bid_collection_system(
    clock: Res<SimulationClock>,
    config: Res<SimConfig>,
    grid: Res<CityGrid>,
    traffic: Res<TrafficState>,
    policy: Res<BidPolicyResource>,
    broadcast: Res<OpenFareBroadcast>,
    directory: Res<TaxiDirectory>,
    mut collected: ResMut<CollectedBids>,
    mut telemetry: ResMut<SimTelemetry>,
    mut taxis: Query<(&mut Taxi, &Position)>,
) {
    collected.bids.clear();
    if broadcast.fares.is_empty() {
        return;
    }
    let now = clock.now();

    let snapshot: Vec<(Entity, TaxiId, GridPosition)> = directory
        .iter()
        .filter_map(|(id, entity)| {
            let (taxi, position) = taxis.get(entity).ok()?;
            taxi.is_available().then_some((entity, id, position.0))
        })
        .collect();

    let router = Router::new(&grid, &traffic);
    let policy: &dyn BidPolicy = &**policy;
    let fares = broadcast.fares.as_slice();
    let max_open = config.max_fare_open_duration;
    let tick_mins = config.tick_duration_mins;

    let offers: Vec<Offers> = snapshot
        .par_iter()
        .map(|&(entity, taxi, position)| Offers {
            entity,
            taxi,
            offers: compute_offers(router, policy, fares, taxi, position, now, max_open, tick_mins),
        })
        .collect();

    let mut seq = 0_u32;
    for Offers {
        entity,
        taxi,
        offers,
    } in offers
    {
        if offers.is_empty() {
            continue;
        }
        for (fare, cost) in offers {
            trace!(tick = now, %taxi, %fare, cost, "bid");
            collected.bids.push(Bid {
                taxi,
                fare,
                cost,
                stamp: BidStamp { tick: now, seq },
            });
            seq += 1;
        }
        if let Ok((mut record, _)) = taxis.get_mut(entity) {
            record.state = TaxiState::Bidding;
        }
    }
    telemetry.bids_submitted += u64::from(seq);
}
