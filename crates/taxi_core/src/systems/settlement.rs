use bevy_ecs::prelude::{Res, ResMut};
use tracing::warn;

use crate::clock::SimulationClock;
use crate::events::{SimEventKind, TickEvents};
use crate::fares::FareBoard;
use crate::systems::movement::{TripReport, TripReports};
use crate::telemetry::{CompletedFareRecord, SimTelemetry};

/// Applies this tick's trip reports to the fare board: pickups move fares to
/// PickedUp, drop-offs complete and archive them and book the revenue.
pub fn settlement_system(
    clock: Res<SimulationClock>,
    mut reports: ResMut<TripReports>,
    mut board: ResMut<FareBoard>,
    mut events: ResMut<TickEvents>,
    mut telemetry: ResMut<SimTelemetry>,
) {
    let now = clock.now();
    for report in reports.drain() {
        match report {
            TripReport::PickedUp { taxi, fare } => {
                if board.mark_picked_up(fare, taxi, now) {
                    events.push(now, SimEventKind::FarePickedUp { fare, taxi });
                } else {
                    warn!(tick = now, %fare, %taxi, "pickup report for a fare the taxi does not hold");
                }
            }
            TripReport::Completed { taxi, fare } => {
                let Some(done) = board.complete(fare, taxi, now) else {
                    warn!(tick = now, %fare, %taxi, "drop-off report for a fare not on board");
                    continue;
                };
                let price = done.price;
                if let Some(record) = CompletedFareRecord::from_fare(done) {
                    telemetry.completed_fares.push(record);
                }
                telemetry.revenue += price;
                events.push(now, SimEventKind::FareCompleted { fare, taxi, price });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::prelude::{Schedule, World};

    use crate::ecs::{FareId, NodeId, TaxiId};
    use crate::fares::FareStatus;

    fn world() -> World {
        let mut world = World::new();
        let mut clock = SimulationClock::default();
        clock.advance();
        world.insert_resource(clock);
        let mut board = FareBoard::default();
        let fare = board.create(NodeId(0), NodeId(2), 6.0, 2.0, 0);
        board.assign(fare, TaxiId(3), 1).expect("assign");
        world.insert_resource(board);
        world.insert_resource(TripReports::default());
        world.insert_resource(TickEvents::default());
        world.insert_resource(SimTelemetry::default());
        world
    }

    fn settle(world: &mut World, reports: Vec<TripReport>) {
        world.resource_mut::<TripReports>().reports = reports;
        let mut schedule = Schedule::default();
        schedule.add_systems(settlement_system);
        schedule.run(world);
    }

    #[test]
    fn pickup_then_drop_off_completes_fare() {
        let mut world = world();
        let taxi = TaxiId(3);
        let fare = FareId(0);
        settle(
            &mut world,
            vec![
                TripReport::PickedUp { taxi, fare },
                TripReport::Completed { taxi, fare },
            ],
        );

        let board = world.resource::<FareBoard>();
        let archived = board.get(fare).expect("fare");
        assert_eq!(archived.status, FareStatus::Completed);
        assert_eq!(board.active_fare_of(taxi), None);

        let telemetry = world.resource::<SimTelemetry>();
        assert_eq!(telemetry.revenue, 6.0);
        assert_eq!(telemetry.completed_fares.len(), 1);
        assert_eq!(telemetry.completed_fares[0].time_to_assign(), 1);
        assert_eq!(world.resource::<TickEvents>().events().len(), 2);
    }

    #[test]
    fn report_from_wrong_taxi_is_ignored() {
        let mut world = world();
        settle(
            &mut world,
            vec![TripReport::PickedUp {
                taxi: TaxiId(9),
                fare: FareId(0),
            }],
        );
        let status = world.resource::<FareBoard>().get(FareId(0)).map(|f| f.status);
        assert_eq!(status, Some(FareStatus::Assigned));
        assert!(world.resource::<TickEvents>().events().is_empty());
    }
}
