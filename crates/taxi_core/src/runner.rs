//! Simulation runner: the per-tick schedule and the [`Simulation`] control surface.
//!
//! Every tick runs the same fixed phase order:
//!
//! ```text
//! Traffic → FareGeneration → BidCollection → Resolution → Movement → Settlement
//! ```
//!
//! Phases are chained system sets on a single-threaded executor, so bid
//! collection always sees the open fares as they stood before resolution.
//! Parallelism lives inside bid collection only.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use bevy_ecs::prelude::{Schedule, SystemSet, World};
use bevy_ecs::schedule::{ExecutorKind, IntoSystemConfigs, IntoSystemSetConfigs};
use tracing::{debug, error, info};

use crate::clock::{SimulationClock, TickLimit};
use crate::ecs::{FareId, NodeId, Position, Taxi, TaxiDirectory, TaxiLedger, TaxiState};
use crate::error::{SimError, ValidationError};
use crate::events::{SimEventKind, TickEvents, TickSummary};
use crate::fares::FareBoard;
use crate::grid::{CityGrid, GridDefinition};
use crate::routing::{RouteCache, Router};
use crate::scenario::{build_world, SimConfig};
use crate::systems::{
    allocation_notice::allocation_notice_system, bid_collection::bid_collection_system,
    broadcast::broadcast_system, duty_roster::duty_roster_system,
    fare_generation::fare_generation_system, movement::movement_system,
    resolution::{resolution_system, FatalFault},
    settlement::settlement_system, traffic_update::traffic_update_system,
};
use crate::telemetry::{SimCounts, SimTelemetry, TaxiSnapshot};
use crate::traffic::TrafficState;

/// Ordered phases of one tick.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum TickPhase {
    Traffic,
    FareGeneration,
    BidCollection,
    Resolution,
    Movement,
    Settlement,
}

/// Builds the per-tick schedule.
pub fn simulation_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);
    schedule.configure_sets(
        (
            TickPhase::Traffic,
            TickPhase::FareGeneration,
            TickPhase::BidCollection,
            TickPhase::Resolution,
            TickPhase::Movement,
            TickPhase::Settlement,
        )
            .chain(),
    );

    schedule.add_systems(traffic_update_system.in_set(TickPhase::Traffic));
    schedule.add_systems(fare_generation_system.in_set(TickPhase::FareGeneration));
    schedule.add_systems(
        (broadcast_system, bid_collection_system)
            .chain()
            .in_set(TickPhase::BidCollection),
    );
    schedule.add_systems(
        (resolution_system, allocation_notice_system)
            .chain()
            .in_set(TickPhase::Resolution),
    );
    schedule.add_systems(
        (movement_system, duty_roster_system)
            .chain()
            .in_set(TickPhase::Movement),
    );
    schedule.add_systems(settlement_system.in_set(TickPhase::Settlement));
    schedule
}

/// Cloneable handle that asks a running simulation to halt after the current tick.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A running simulation: the ECS world, its schedule, and the control surface.
pub struct Simulation {
    world: World,
    schedule: Schedule,
    stop: StopHandle,
    halted: bool,
    subscribers: Vec<Sender<TickSummary>>,
}

impl Simulation {
    /// Validates the grid and configuration and builds the world at tick 0.
    pub fn start(config: SimConfig, grid: &GridDefinition) -> Result<Self, SimError> {
        let grid = CityGrid::from_definition(grid)?;
        let (nodes, edges) = (grid.node_count(), grid.edge_count());
        let mut world = World::new();
        build_world(&mut world, &config, grid)?;
        info!(
            nodes,
            edges,
            taxis = config.taxi_count,
            seed = config.random_seed,
            max_ticks = config.max_ticks,
            "simulation started"
        );
        Ok(Self {
            world,
            schedule: simulation_schedule(),
            stop: StopHandle::default(),
            halted: false,
            subscribers: Vec::new(),
        })
    }

    /// Runs the next tick and returns what happened in it.
    ///
    /// Returns [`SimError::Halted`] once the tick limit is reached or a stop was
    /// requested, and the fault itself when the fare board detects a double
    /// assignment. A halted simulation stays halted.
    pub fn step(&mut self) -> Result<TickSummary, SimError> {
        if self.halted {
            return Err(SimError::Halted);
        }
        if self.stop.is_stopped() {
            self.halt("stop requested");
            return Err(SimError::Halted);
        }
        if self.now() >= self.world.resource::<TickLimit>().0 {
            self.halt("tick limit reached");
            return Err(SimError::Halted);
        }

        let tick = self.world.resource_mut::<SimulationClock>().advance();
        self.schedule.run(&mut self.world);

        if let Some(fault) = self.world.resource_mut::<FatalFault>().0.take() {
            error!(tick, %fault, "simulation halted on invariant violation");
            self.halted = true;
            return Err(fault.into());
        }

        let events = self.world.resource_mut::<TickEvents>().take();
        let summary = TickSummary {
            tick,
            events,
            counts: self.counts(),
        };
        self.subscribers
            .retain(|subscriber| subscriber.send(summary.clone()).is_ok());
        Ok(summary)
    }

    /// Runs until the tick limit or a stop request.
    pub fn run(&mut self) -> Result<(), SimError> {
        self.run_with_hook(|_| {})
    }

    /// Like [`Simulation::run`], calling `hook` with every tick's summary.
    pub fn run_with_hook<F>(&mut self, mut hook: F) -> Result<(), SimError>
    where
        F: FnMut(&TickSummary),
    {
        loop {
            match self.step() {
                Ok(summary) => hook(&summary),
                Err(SimError::Halted) => return Ok(()),
                Err(err) => return Err(err),
            }
        }
    }

    /// Requests a halt; the next `step` returns [`SimError::Halted`].
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Receives a copy of every subsequent [`TickSummary`]. Dropped receivers
    /// are forgotten on the next tick.
    pub fn subscribe(&mut self) -> Receiver<TickSummary> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.push(sender);
        receiver
    }

    /// Places a fare on the board at the current tick, priced like a generated one.
    ///
    /// The fare is accepted even when its destination cannot be reached; the
    /// dispatcher expires it as `Unroutable` at the next round.
    pub fn inject_fare(&mut self, origin: NodeId, destination: NodeId) -> Result<FareId, ValidationError> {
        let now = self.now();
        let (route_cost, price) = {
            let grid = self.world.resource::<CityGrid>();
            for node in [origin, destination] {
                if !grid.contains(node) {
                    return Err(ValidationError::new(format!("fare endpoint {node} is not on the grid")));
                }
            }
            if origin == destination {
                return Err(ValidationError::new(format!(
                    "fare origin and destination are both {origin}"
                )));
            }
            let traffic = self.world.resource::<TrafficState>();
            let cache = self.world.resource::<RouteCache>();
            let route_cost = match Router::new(grid, traffic)
                .with_cache(cache)
                .shortest_path(origin, destination)
            {
                Ok(route) => route.total_cost,
                Err(err) => {
                    debug!(%err, "injected fare has no route");
                    0.0
                }
            };
            let board = self.world.resource::<FareBoard>();
            let counts = self.counts();
            let price = self.world.resource::<SimConfig>().pricing.quote(
                route_cost,
                board.open_count() + 1,
                counts.taxis_on_duty() as usize,
            );
            (route_cost, price)
        };

        let fare = self
            .world
            .resource_mut::<FareBoard>()
            .create(origin, destination, price, route_cost, now);
        self.world.resource_mut::<TickEvents>().push(
            now,
            SimEventKind::FareCreated {
                fare,
                origin,
                destination,
                price,
            },
        );
        Ok(fare)
    }

    pub fn now(&self) -> u64 {
        self.world.resource::<SimulationClock>().now()
    }

    pub fn config(&self) -> &SimConfig {
        self.world.resource::<SimConfig>()
    }

    pub fn fares(&self) -> &FareBoard {
        self.world.resource::<FareBoard>()
    }

    pub fn telemetry(&self) -> &SimTelemetry {
        self.world.resource::<SimTelemetry>()
    }

    pub fn route_cache(&self) -> &RouteCache {
        self.world.resource::<RouteCache>()
    }

    /// Taxis in id order.
    pub fn taxis(&self) -> Vec<TaxiSnapshot> {
        self.world
            .resource::<TaxiDirectory>()
            .iter()
            .filter_map(|(_, entity)| {
                let taxi = self.world.get::<Taxi>(entity)?;
                let position = self.world.get::<Position>(entity)?;
                let ledger = self.world.get::<TaxiLedger>(entity)?;
                Some(TaxiSnapshot {
                    id: taxi.id,
                    state: taxi.state,
                    position: position.0,
                    fare: taxi.assigned_fare(),
                    earnings: ledger.earnings,
                    idle_ticks: ledger.idle_ticks,
                    total_idle_ticks: ledger.total_idle_ticks,
                    completed_fares: ledger.completed_fares,
                })
            })
            .collect()
    }

    /// Fare and taxi counts as of now.
    pub fn counts(&self) -> SimCounts {
        let mut counts = SimCounts {
            fares: self.fares().counts(),
            ..SimCounts::default()
        };
        for (_, entity) in self.world.resource::<TaxiDirectory>().iter() {
            let state = self
                .world
                .get::<Taxi>(entity)
                .map_or(TaxiState::OffDuty, |taxi| taxi.state);
            counts.add_taxi(state);
        }
        counts
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    fn halt(&mut self, reason: &str) {
        self.halted = true;
        let telemetry = self.telemetry();
        info!(
            tick = self.now(),
            reason,
            completed = telemetry.completed_fares.len(),
            expired = telemetry.expired_timeout + telemetry.expired_unroutable,
            revenue = telemetry.revenue,
            "simulation finished"
        );
    }
}
