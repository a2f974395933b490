//! Simulation event stream.
//!
//! Systems append to [`TickEvents`] while a tick runs; the runner drains the
//! buffer into a [`TickSummary`] once every phase has finished.

use bevy_ecs::prelude::Resource;
use serde::Serialize;

use crate::ecs::{FareId, GridPosition, NodeId, TaxiId};
use crate::fares::ExpiryReason;
use crate::telemetry::SimCounts;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEventKind {
    FareCreated {
        fare: FareId,
        origin: NodeId,
        destination: NodeId,
        price: f64,
    },
    FareAssigned {
        fare: FareId,
        taxi: TaxiId,
        cost: f64,
    },
    FarePickedUp {
        fare: FareId,
        taxi: TaxiId,
    },
    FareCompleted {
        fare: FareId,
        taxi: TaxiId,
        price: f64,
    },
    FareExpired {
        fare: FareId,
        reason: ExpiryReason,
    },
    /// Pickup timed out; the fare is Open again and the taxi released.
    FareReassigned {
        fare: FareId,
        taxi: TaxiId,
    },
    TaxiMoved {
        taxi: TaxiId,
        position: GridPosition,
    },
    TaxiOffDuty {
        taxi: TaxiId,
    },
    TaxiOnDuty {
        taxi: TaxiId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimEvent {
    pub tick: u64,
    #[serde(flatten)]
    pub kind: SimEventKind,
}

/// Events emitted during the current tick, in emission order.
#[derive(Debug, Default, Resource)]
pub struct TickEvents {
    events: Vec<SimEvent>,
}

impl TickEvents {
    pub fn push(&mut self, tick: u64, kind: SimEventKind) {
        self.events.push(SimEvent { tick, kind });
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn take(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Read-only result of one tick, handed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickSummary {
    pub tick: u64,
    pub events: Vec<SimEvent>,
    pub counts: SimCounts,
}
