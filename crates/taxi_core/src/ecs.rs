use std::collections::BTreeMap;
use std::fmt;

use bevy_ecs::prelude::{Component, Entity, Resource};
use serde::{Deserialize, Serialize};

use crate::routing::{Route, RouteLeg};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EdgeId(pub u32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaxiId(pub u32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FareId(pub u64);

macro_rules! display_inner {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        })*
    };
}

display_inner!(NodeId, EdgeId, TaxiId, FareId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxiState {
    Idle,
    Bidding,
    EnRouteToPickup,
    Transporting,
    OffDuty,
}

/// Where a taxi is: parked at a junction or part-way along a street.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "at", rename_all = "snake_case")]
pub enum GridPosition {
    Node { node: NodeId },
    Edge { leg: RouteLeg, progress: f64 },
}

impl GridPosition {
    /// The node the taxi stands at, or the node it is heading to when in transit.
    pub fn anchor(&self) -> NodeId {
        match self {
            GridPosition::Node { node } => *node,
            GridPosition::Edge { leg, .. } => leg.to,
        }
    }

    pub fn node(&self) -> Option<NodeId> {
        match self {
            GridPosition::Node { node } => Some(*node),
            GridPosition::Edge { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Component)]
pub struct Position(pub GridPosition);

/// What the dispatcher told a taxi about the fare it won.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FareJob {
    pub fare: FareId,
    pub origin: NodeId,
    pub destination: NodeId,
    pub price: f64,
    /// Tick at which the dispatcher assigned the fare.
    pub assigned_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Component)]
pub struct Taxi {
    pub id: TaxiId,
    pub state: TaxiState,
    /// The single fare this taxi is serving, if any.
    pub job: Option<FareJob>,
}

impl Taxi {
    pub fn new(id: TaxiId) -> Self {
        Self {
            id,
            state: TaxiState::Idle,
            job: None,
        }
    }

    pub fn assigned_fare(&self) -> Option<FareId> {
        self.job.map(|job| job.fare)
    }

    /// Idle or Bidding taxis take part in the allocation round.
    pub fn is_available(&self) -> bool {
        matches!(self.state, TaxiState::Idle | TaxiState::Bidding) && self.job.is_none()
    }
}

/// Earnings, idle time and shift account of one taxi.
#[derive(Debug, Clone, Default, PartialEq, Component)]
pub struct TaxiLedger {
    pub earnings: f64,
    /// Idle ticks since the last completed fare.
    pub idle_ticks: u64,
    /// Idle ticks over the whole run.
    pub total_idle_ticks: u64,
    pub completed_fares: u32,
    /// Remaining shift budget; `None` when the duty cycle is disabled.
    pub account: Option<f64>,
    pub off_duty_since: Option<u64>,
}

/// A planned route and how far along it the taxi is.
#[derive(Debug, Clone, PartialEq, Component)]
pub struct TaxiRoute {
    pub route: Route,
    /// Index of the first leg not yet completed.
    pub cursor: usize,
    /// Traffic epoch the route was planned under.
    pub planned_epoch: u64,
}

impl TaxiRoute {
    pub fn new(route: Route, planned_epoch: u64) -> Self {
        Self {
            route,
            cursor: 0,
            planned_epoch,
        }
    }

    pub fn remaining_legs(&self) -> &[RouteLeg] {
        &self.route.legs[self.cursor.min(self.route.legs.len())..]
    }

    pub fn target(&self) -> NodeId {
        self.route.destination
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.route.legs.len()
    }
}

/// Taxi entities by id. Systems walk taxis in this order so runs stay deterministic.
#[derive(Debug, Default, Resource)]
pub struct TaxiDirectory(pub BTreeMap<TaxiId, Entity>);

impl TaxiDirectory {
    pub fn get(&self, id: TaxiId) -> Option<Entity> {
        self.0.get(&id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaxiId, Entity)> + '_ {
        self.0.iter().map(|(id, entity)| (*id, *entity))
    }
}
