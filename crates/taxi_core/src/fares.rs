//! Fare records and the dispatcher's fare board.
//!
//! Only dispatcher systems write to the [`FareBoard`]. Taxis report progress
//! through trip reports which the settlement phase applies here.

use std::collections::{BTreeMap, HashMap};

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::ecs::{FareId, NodeId, TaxiId};
use crate::error::AssignmentConflictError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FareStatus {
    Open,
    Assigned,
    PickedUp,
    Completed,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpiryReason {
    /// Open longer than the configured maximum.
    Timeout,
    /// Origin cannot reach destination.
    Unroutable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fare {
    pub id: FareId,
    pub origin: NodeId,
    pub destination: NodeId,
    pub created_at: u64,
    /// Tick the fare last became Open; reset on reassignment.
    pub open_since: u64,
    pub status: FareStatus,
    pub assigned_taxi: Option<TaxiId>,
    pub price: f64,
    /// Route cost origin → destination when the fare was created.
    pub route_cost: f64,
    pub assigned_at: Option<u64>,
    pub picked_up_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub expired_at: Option<u64>,
    pub expiry_reason: Option<ExpiryReason>,
    pub reassignments: u32,
}

impl Fare {
    pub fn is_open(&self) -> bool {
        self.status == FareStatus::Open
    }

    /// Ticks spent Open since it last became Open.
    pub fn open_for(&self, now: u64) -> u64 {
        now.saturating_sub(self.open_since)
    }
}

/// Fare counts by lifecycle stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FareCounts {
    pub created: u64,
    pub open: u64,
    pub assigned: u64,
    pub picked_up: u64,
    pub completed: u64,
    pub expired: u64,
}

impl FareCounts {
    /// Every fare created is completed, expired, or still in the system.
    pub fn is_conserved(&self) -> bool {
        self.created == self.completed + self.expired + self.open + self.assigned + self.picked_up
    }
}

#[derive(Debug, Default, Resource)]
pub struct FareBoard {
    active: BTreeMap<FareId, Fare>,
    archive: Vec<Fare>,
    archive_index: HashMap<FareId, usize>,
    /// Active fare per taxi.
    taxi_jobs: HashMap<TaxiId, FareId>,
    next_id: u64,
}

impl FareBoard {
    /// Registers a new Open fare and returns its id.
    pub fn create(
        &mut self,
        origin: NodeId,
        destination: NodeId,
        price: f64,
        route_cost: f64,
        now: u64,
    ) -> FareId {
        let id = FareId(self.next_id);
        self.next_id += 1;
        self.active.insert(
            id,
            Fare {
                id,
                origin,
                destination,
                created_at: now,
                open_since: now,
                status: FareStatus::Open,
                assigned_taxi: None,
                price,
                route_cost,
                assigned_at: None,
                picked_up_at: None,
                completed_at: None,
                expired_at: None,
                expiry_reason: None,
                reassignments: 0,
            },
        );
        id
    }

    /// Looks up a fare, active or archived.
    pub fn get(&self, id: FareId) -> Option<&Fare> {
        self.active
            .get(&id)
            .or_else(|| self.archive_index.get(&id).map(|&i| &self.archive[i]))
    }

    pub fn active(&self) -> impl Iterator<Item = &Fare> {
        self.active.values()
    }

    /// Open fares in ascending id order.
    pub fn open_fares(&self) -> impl Iterator<Item = &Fare> {
        self.active.values().filter(|f| f.is_open())
    }

    pub fn open_count(&self) -> usize {
        self.open_fares().count()
    }

    pub fn has_open_fare_at(&self, origin: NodeId) -> bool {
        self.open_fares().any(|f| f.origin == origin)
    }

    /// Completed and expired fares in the order they were closed.
    pub fn archive(&self) -> &[Fare] {
        &self.archive
    }

    pub fn active_fare_of(&self, taxi: TaxiId) -> Option<FareId> {
        self.taxi_jobs.get(&taxi).copied()
    }

    /// Assigns an Open fare to a taxi.
    ///
    /// Returns `Ok(false)` when the fare is unknown or already closed.
    pub fn assign(&mut self, id: FareId, taxi: TaxiId, now: u64) -> Result<bool, AssignmentConflictError> {
        if let Some(&active) = self.taxi_jobs.get(&taxi) {
            return Err(AssignmentConflictError::TaxiAlreadyBusy {
                taxi,
                active,
                contender: id,
            });
        }
        let Some(fare) = self.active.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(holder) = fare.assigned_taxi {
            return Err(AssignmentConflictError::FareAlreadyAssigned {
                fare: id,
                holder,
                contender: taxi,
            });
        }
        fare.status = FareStatus::Assigned;
        fare.assigned_taxi = Some(taxi);
        fare.assigned_at = Some(now);
        self.taxi_jobs.insert(taxi, id);
        Ok(true)
    }

    /// Records the pickup reported by the assigned taxi.
    pub fn mark_picked_up(&mut self, id: FareId, taxi: TaxiId, now: u64) -> bool {
        match self.active.get_mut(&id) {
            Some(fare) if fare.status == FareStatus::Assigned && fare.assigned_taxi == Some(taxi) => {
                fare.status = FareStatus::PickedUp;
                fare.picked_up_at = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Completes a picked-up fare and archives it.
    pub fn complete(&mut self, id: FareId, taxi: TaxiId, now: u64) -> Option<&Fare> {
        let valid = matches!(
            self.active.get(&id),
            Some(fare) if fare.status == FareStatus::PickedUp && fare.assigned_taxi == Some(taxi)
        );
        if !valid {
            return None;
        }
        let mut fare = self.active.remove(&id)?;
        fare.status = FareStatus::Completed;
        fare.completed_at = Some(now);
        self.taxi_jobs.remove(&taxi);
        Some(self.archive_fare(fare))
    }

    /// Expires an Open fare and archives it.
    pub fn expire(&mut self, id: FareId, reason: ExpiryReason, now: u64) -> Option<&Fare> {
        if !self.active.get(&id).is_some_and(Fare::is_open) {
            return None;
        }
        let mut fare = self.active.remove(&id)?;
        fare.status = FareStatus::Expired;
        fare.expired_at = Some(now);
        fare.expiry_reason = Some(reason);
        Some(self.archive_fare(fare))
    }

    /// Returns an Assigned fare to Open, releasing its taxi.
    pub fn reopen(&mut self, id: FareId, now: u64) -> Option<TaxiId> {
        let fare = self.active.get_mut(&id)?;
        if fare.status != FareStatus::Assigned {
            return None;
        }
        let taxi = fare.assigned_taxi.take()?;
        fare.status = FareStatus::Open;
        fare.open_since = now;
        fare.assigned_at = None;
        fare.reassignments += 1;
        self.taxi_jobs.remove(&taxi);
        Some(taxi)
    }

    fn archive_fare(&mut self, fare: Fare) -> &Fare {
        self.archive_index.insert(fare.id, self.archive.len());
        self.archive.push(fare);
        &self.archive[self.archive.len() - 1]
    }

    pub fn counts(&self) -> FareCounts {
        let mut counts = FareCounts {
            created: self.next_id,
            ..FareCounts::default()
        };
        for fare in self.active.values().chain(&self.archive) {
            match fare.status {
                FareStatus::Open => counts.open += 1,
                FareStatus::Assigned => counts.assigned += 1,
                FareStatus::PickedUp => counts.picked_up += 1,
                FareStatus::Completed => counts.completed += 1,
                FareStatus::Expired => counts.expired += 1,
            }
        }
        counts
    }
}
