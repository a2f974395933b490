use bevy_ecs::prelude::Resource;

/// Discrete simulation clock. Tick 0 is scenario setup; each step advances by one.
#[derive(Debug, Default, Clone, Copy, Resource)]
pub struct SimulationClock {
    now: u64,
}

impl SimulationClock {
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Moves to the next tick and returns it.
    pub fn advance(&mut self) -> u64 {
        self.now += 1;
        self.now
    }
}

/// Last tick a run executes.
#[derive(Debug, Clone, Copy, Resource)]
pub struct TickLimit(pub u64);
