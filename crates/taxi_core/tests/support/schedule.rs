#![allow(dead_code)]

use bevy_ecs::prelude::World;
use bevy_ecs::schedule::Schedule;
use taxi_core::clock::SimulationClock;
use taxi_core::events::{SimEvent, TickEvents};
use taxi_core::runner::simulation_schedule;

/// Owns the tick schedule so tests can drive a hand-built world tick by tick.
pub struct ScheduleRunner {
    schedule: Schedule,
}

impl Default for ScheduleRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleRunner {
    pub fn new() -> Self {
        Self {
            schedule: simulation_schedule(),
        }
    }

    /// Advance the clock and run every phase once. Returns the tick's events.
    pub fn run_tick(&mut self, world: &mut World) -> Vec<SimEvent> {
        world.resource_mut::<SimulationClock>().advance();
        self.schedule.run(world);
        world.resource_mut::<TickEvents>().take()
    }

    /// Run `ticks` ticks and return all their events in order.
    pub fn run_ticks(&mut self, world: &mut World, ticks: u64) -> Vec<SimEvent> {
        (0..ticks).flat_map(|_| self.run_tick(world)).collect()
    }
}
