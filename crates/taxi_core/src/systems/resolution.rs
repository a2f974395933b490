//! Allocation round: validates the collected bids, runs the auction and records
//! the winners on the fare board.
//!
//! Taxis are never touched here. The outcome for each bidder is queued in the
//! [`DispatchOutbox`] and delivered by the allocation notice system.

use std::collections::{BTreeSet, HashMap};

use bevy_ecs::prelude::{Query, Res, ResMut, Resource};
use tracing::{debug, error};

use crate::auction::{resolve_round, validate_bids};
use crate::clock::SimulationClock;
use crate::ecs::{FareId, FareJob, Taxi, TaxiId, TaxiState};
use crate::error::AssignmentConflictError;
use crate::events::{SimEventKind, TickEvents};
use crate::fares::FareBoard;
use crate::systems::bid_collection::CollectedBids;
use crate::telemetry::SimTelemetry;

/// A message from the dispatcher to one taxi.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DispatchNotice {
    Won { taxi: TaxiId, job: FareJob },
    Lost { taxi: TaxiId },
    /// The taxi missed its pickup deadline and no longer holds `fare`.
    Released { taxi: TaxiId, fare: FareId },
}

impl DispatchNotice {
    pub fn taxi(&self) -> TaxiId {
        match self {
            DispatchNotice::Won { taxi, .. }
            | DispatchNotice::Lost { taxi }
            | DispatchNotice::Released { taxi, .. } => *taxi,
        }
    }
}

/// Notices queued for delivery this tick, in the order they were issued.
#[derive(Debug, Default, Resource)]
pub struct DispatchOutbox {
    pub notices: Vec<DispatchNotice>,
}

impl DispatchOutbox {
    pub fn drain(&mut self) -> Vec<DispatchNotice> {
        std::mem::take(&mut self.notices)
    }
}

/// Set when the fare board refuses an assignment. The runner halts on it.
#[derive(Debug, Default, Resource)]
pub struct FatalFault(pub Option<AssignmentConflictError>);

#[allow(clippy::too_many_arguments)]
pub fn resolution_system(
    clock: Res<SimulationClock>,
    mut collected: ResMut<CollectedBids>,
    mut board: ResMut<FareBoard>,
    mut outbox: ResMut<DispatchOutbox>,
    mut events: ResMut<TickEvents>,
    mut telemetry: ResMut<SimTelemetry>,
    mut fault: ResMut<FatalFault>,
    taxis: Query<&Taxi>,
) {
    let bids = collected.take();
    if bids.is_empty() {
        return;
    }
    let now = clock.now();

    let states: HashMap<TaxiId, TaxiState> = taxis.iter().map(|t| (t.id, t.state)).collect();
    let bidders: BTreeSet<TaxiId> = bids.iter().map(|b| b.taxi).collect();

    let (valid, stale) = validate_bids(bids, &board, |taxi| states.get(&taxi).copied());
    for err in &stale {
        debug!(tick = now, %err, "discarding stale bid");
    }
    telemetry.stale_bids += stale.len() as u64;
    if valid.is_empty() {
        outbox
            .notices
            .extend(bidders.into_iter().map(|taxi| DispatchNotice::Lost { taxi }));
        return;
    }

    let round = resolve_round(&valid);
    telemetry.rounds += 1;
    telemetry.contested_passes += u64::from(round.passes.saturating_sub(1));

    let mut winners = BTreeSet::new();
    for assignment in round.assignments {
        match board.assign(assignment.fare, assignment.taxi, now) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => {
                // Stop assigning; every bidder without a win still hears back.
                error!(tick = now, %err, "assignment conflict");
                fault.0 = Some(err);
                break;
            }
        }
        let Some(fare) = board.get(assignment.fare) else {
            continue;
        };
        let job = FareJob {
            fare: fare.id,
            origin: fare.origin,
            destination: fare.destination,
            price: fare.price,
            assigned_at: now,
        };
        winners.insert(assignment.taxi);
        outbox.notices.push(DispatchNotice::Won {
            taxi: assignment.taxi,
            job,
        });
        events.push(
            now,
            SimEventKind::FareAssigned {
                fare: assignment.fare,
                taxi: assignment.taxi,
                cost: assignment.cost,
            },
        );
    }

    outbox.notices.extend(
        bidders
            .difference(&winners)
            .map(|&taxi| DispatchNotice::Lost { taxi }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::prelude::{Schedule, World};

    use crate::bidding::{Bid, BidStamp};
    use crate::ecs::NodeId;
    use crate::fares::FareStatus;

    fn bid(taxi: u32, fare: u64, cost: f64, seq: u32) -> Bid {
        Bid {
            taxi: TaxiId(taxi),
            fare: FareId(fare),
            cost,
            stamp: BidStamp { tick: 1, seq },
        }
    }

    fn world_with_fares(count: usize) -> World {
        let mut world = World::new();
        let mut clock = SimulationClock::default();
        clock.advance();
        world.insert_resource(clock);
        let mut board = FareBoard::default();
        for i in 0..count {
            board.create(NodeId(i as u32), NodeId(9), 5.0, 2.0, 0);
        }
        world.insert_resource(board);
        world.insert_resource(CollectedBids::default());
        world.insert_resource(DispatchOutbox::default());
        world.insert_resource(TickEvents::default());
        world.insert_resource(SimTelemetry::default());
        world.insert_resource(FatalFault::default());
        for id in 0..3 {
            let mut taxi = Taxi::new(TaxiId(id));
            taxi.state = TaxiState::Bidding;
            world.spawn(taxi);
        }
        world
    }

    fn run(world: &mut World) {
        let mut schedule = Schedule::default();
        schedule.add_systems(resolution_system);
        schedule.run(world);
    }

    #[test]
    fn winner_assigned_and_loser_notified() {
        let mut world = world_with_fares(1);
        world.resource_mut::<CollectedBids>().bids = vec![bid(0, 0, 4.0, 0), bid(1, 0, 3.0, 1)];
        run(&mut world);

        let fare = world.resource::<FareBoard>().get(FareId(0)).cloned().expect("fare");
        assert_eq!(fare.status, FareStatus::Assigned);
        assert_eq!(fare.assigned_taxi, Some(TaxiId(1)));
        assert_eq!(fare.assigned_at, Some(1));

        let notices = world.resource::<DispatchOutbox>().notices.clone();
        assert_eq!(notices.len(), 2);
        assert!(matches!(notices[0], DispatchNotice::Won { taxi: TaxiId(1), job } if job.fare == FareId(0)));
        assert_eq!(notices[1], DispatchNotice::Lost { taxi: TaxiId(0) });
        assert_eq!(world.resource::<TickEvents>().events().len(), 1);
        assert_eq!(world.resource::<SimTelemetry>().rounds, 1);
    }

    #[test]
    fn bids_on_closed_fares_are_counted_as_stale() {
        let mut world = world_with_fares(1);
        world.resource_mut::<CollectedBids>().bids = vec![bid(0, 7, 1.0, 0)];
        run(&mut world);

        assert_eq!(world.resource::<SimTelemetry>().stale_bids, 1);
        assert_eq!(
            world.resource::<DispatchOutbox>().notices,
            vec![DispatchNotice::Lost { taxi: TaxiId(0) }]
        );
        assert_eq!(world.resource::<FareBoard>().open_count(), 1);
    }

    #[test]
    fn busy_taxi_on_board_raises_fatal_fault() {
        let mut world = world_with_fares(2);
        world
            .resource_mut::<FareBoard>()
            .assign(FareId(1), TaxiId(2), 0)
            .expect("assign");
        world.resource_mut::<CollectedBids>().bids = vec![bid(2, 0, 1.0, 0), bid(0, 0, 3.0, 1)];
        run(&mut world);

        assert!(matches!(
            world.resource::<FatalFault>().0,
            Some(AssignmentConflictError::TaxiAlreadyBusy { .. })
        ));
        assert_eq!(
            world.resource::<DispatchOutbox>().notices,
            vec![
                DispatchNotice::Lost { taxi: TaxiId(0) },
                DispatchNotice::Lost { taxi: TaxiId(2) },
            ]
        );
        assert_eq!(world.resource::<FareBoard>().open_count(), 1);
    }

    #[test]
    fn empty_round_changes_nothing() {
        let mut world = world_with_fares(1);
        run(&mut world);
        assert!(world.resource::<DispatchOutbox>().notices.is_empty());
        assert_eq!(world.resource::<SimTelemetry>().rounds, 0);
    }
}
