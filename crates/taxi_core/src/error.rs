//! Error taxonomy for the simulation engine.
//!
//! Only [`ValidationError`] and [`AssignmentConflictError`] are fatal. A
//! [`NoPathError`] is absorbed by expiring the affected fare (or by the taxi
//! not bidding), and a [`StaleBidError`] is dropped with a debug log.

use std::fmt;

use crate::ecs::{FareId, NodeId, TaxiId};

/// Malformed grid or configuration input, reported before the first tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed: {}", self.message)
    }
}

impl std::error::Error for ValidationError {}

/// No route exists between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoPathError {
    pub from: NodeId,
    pub to: NodeId,
}

impl fmt::Display for NoPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no path from node {} to node {}", self.from, self.to)
    }
}

impl std::error::Error for NoPathError {}

/// Why a bid could not be honoured at resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    FareNotOpen,
    UnknownFare,
    TaxiNotBidding,
    UnknownTaxi,
}

/// A bid that referenced a fare or taxi no longer eligible when the round resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleBidError {
    pub taxi: TaxiId,
    pub fare: FareId,
    pub reason: StaleReason,
}

impl fmt::Display for StaleBidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stale bid from taxi {} for fare {}: {:?}",
            self.taxi, self.fare, self.reason
        )
    }
}

impl std::error::Error for StaleBidError {}

/// Dispatcher invariant violation. Indicates a logic defect, never a runtime condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentConflictError {
    FareAlreadyAssigned {
        fare: FareId,
        holder: TaxiId,
        contender: TaxiId,
    },
    TaxiAlreadyBusy {
        taxi: TaxiId,
        active: FareId,
        contender: FareId,
    },
}

impl fmt::Display for AssignmentConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentConflictError::FareAlreadyAssigned {
                fare,
                holder,
                contender,
            } => write!(
                f,
                "fare {fare} already assigned to taxi {holder}, refused taxi {contender}"
            ),
            AssignmentConflictError::TaxiAlreadyBusy {
                taxi,
                active,
                contender,
            } => write!(
                f,
                "taxi {taxi} already serves fare {active}, refused fare {contender}"
            ),
        }
    }
}

impl std::error::Error for AssignmentConflictError {}

/// Top-level error returned by the simulation control surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    Validation(ValidationError),
    AssignmentConflict(AssignmentConflictError),
    /// `step` was called after the run reached its tick limit, was stopped, or faulted.
    Halted,
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Validation(err) => err.fmt(f),
            SimError::AssignmentConflict(err) => write!(f, "assignment conflict: {err}"),
            SimError::Halted => f.write_str("simulation has halted"),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::Validation(err) => Some(err),
            SimError::AssignmentConflict(err) => Some(err),
            SimError::Halted => None,
        }
    }
}

impl From<ValidationError> for SimError {
    fn from(err: ValidationError) -> Self {
        SimError::Validation(err)
    }
}

impl From<AssignmentConflictError> for SimError {
    fn from(err: AssignmentConflictError) -> Self {
        SimError::AssignmentConflict(err)
    }
}
