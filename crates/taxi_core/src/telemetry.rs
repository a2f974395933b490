//! Telemetry / KPIs: completed fares, revenue, and auction statistics.

use bevy_ecs::prelude::Resource;
use serde::Serialize;

use crate::ecs::{FareId, GridPosition, TaxiId, TaxiState};
use crate::fares::{ExpiryReason, Fare, FareCounts};

/// One completed fare, recorded when the taxi reaches the destination.
/// Timestamps are simulation ticks; use the helper methods for derived KPIs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedFareRecord {
    pub fare: FareId,
    pub taxi: TaxiId,
    pub created_at: u64,
    pub assigned_at: u64,
    pub picked_up_at: u64,
    pub completed_at: u64,
    pub price: f64,
    pub reassignments: u32,
}

impl CompletedFareRecord {
    /// Builds a record from an archived, completed fare.
    pub fn from_fare(fare: &Fare) -> Option<Self> {
        Some(Self {
            fare: fare.id,
            taxi: fare.assigned_taxi?,
            created_at: fare.created_at,
            assigned_at: fare.assigned_at?,
            picked_up_at: fare.picked_up_at?,
            completed_at: fare.completed_at?,
            price: fare.price,
            reassignments: fare.reassignments,
        })
    }

    /// Time from creation to the (final) assignment.
    pub fn time_to_assign(&self) -> u64 {
        self.assigned_at.saturating_sub(self.created_at)
    }

    /// Time from assignment to pickup.
    pub fn time_to_pickup(&self) -> u64 {
        self.picked_up_at.saturating_sub(self.assigned_at)
    }

    /// Time from pickup to drop-off.
    pub fn trip_duration(&self) -> u64 {
        self.completed_at.saturating_sub(self.picked_up_at)
    }

    /// Time the passenger waited from request to pickup.
    pub fn total_wait(&self) -> u64 {
        self.picked_up_at.saturating_sub(self.created_at)
    }
}

/// Collects simulation telemetry over a run.
#[derive(Debug, Default, Resource)]
pub struct SimTelemetry {
    pub completed_fares: Vec<CompletedFareRecord>,
    pub expired_timeout: u64,
    pub expired_unroutable: u64,
    pub revenue: f64,
    pub bids_submitted: u64,
    pub stale_bids: u64,
    pub reassignments: u64,
    /// Allocation rounds that received at least one bid.
    pub rounds: u64,
    /// Extra selection passes caused by taxis winning several fares at once.
    pub contested_passes: u64,
}

impl SimTelemetry {
    pub fn record_expiry(&mut self, reason: ExpiryReason) {
        match reason {
            ExpiryReason::Timeout => self.expired_timeout += 1,
            ExpiryReason::Unroutable => self.expired_unroutable += 1,
        }
    }
}

/// Aggregated counts at a tick boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SimCounts {
    pub fares: FareCounts,
    pub taxis_idle: u32,
    pub taxis_bidding: u32,
    pub taxis_en_route: u32,
    pub taxis_transporting: u32,
    pub taxis_off_duty: u32,
}

impl SimCounts {
    pub fn add_taxi(&mut self, state: TaxiState) {
        match state {
            TaxiState::Idle => self.taxis_idle += 1,
            TaxiState::Bidding => self.taxis_bidding += 1,
            TaxiState::EnRouteToPickup => self.taxis_en_route += 1,
            TaxiState::Transporting => self.taxis_transporting += 1,
            TaxiState::OffDuty => self.taxis_off_duty += 1,
        }
    }

    pub fn taxis_on_duty(&self) -> u32 {
        self.taxis_idle + self.taxis_bidding + self.taxis_en_route + self.taxis_transporting
    }
}

/// Snapshot of one taxi for inspection and export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxiSnapshot {
    pub id: TaxiId,
    pub state: TaxiState,
    pub position: GridPosition,
    pub fare: Option<FareId>,
    pub earnings: f64,
    pub idle_ticks: u64,
    pub total_idle_ticks: u64,
    pub completed_fares: u32,
}
