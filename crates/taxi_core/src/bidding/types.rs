use serde::{Deserialize, Serialize};

use crate::ecs::{FareId, NodeId, TaxiId};

/// When a bid was submitted: the tick, then its order within the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BidStamp {
    pub tick: u64,
    pub seq: u32,
}

/// A taxi's cost estimate for one open fare. Lower is stronger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bid {
    pub taxi: TaxiId,
    pub fare: FareId,
    pub cost: f64,
    pub stamp: BidStamp,
}

/// Everything a policy may look at when deciding whether to bid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BidContext {
    pub taxi: TaxiId,
    pub fare: FareId,
    pub origin: NodeId,
    pub destination: NodeId,
    pub price: f64,
    /// Traffic-adjusted cost from the taxi to the fare origin.
    pub pickup_cost: f64,
    /// Traffic-adjusted cost from the fare origin to its destination.
    pub trip_cost: f64,
    pub now: u64,
    pub open_since: u64,
    pub max_open_duration: u64,
    pub tick_duration_mins: f64,
}

impl BidContext {
    /// The bid value: pickup leg plus trip leg.
    pub fn total_cost(&self) -> f64 {
        self.pickup_cost + self.trip_cost
    }

    /// Ticks needed to reach the pickup at one cost unit per minute.
    pub fn ticks_to_pickup(&self) -> u64 {
        if self.tick_duration_mins <= 0.0 {
            return 0;
        }
        (self.pickup_cost / self.tick_duration_mins).ceil() as u64
    }

    /// Last tick at which the fare is still open.
    pub fn open_until(&self) -> u64 {
        self.open_since + self.max_open_duration
    }
}

/// Which bid policy taxis use. Selected once per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum BidPolicyKind {
    /// Bid on every open fare.
    #[default]
    Unconditional,
    /// Only fares whose pickup leg costs at most `max_pickup_cost`.
    PickupRadius { max_pickup_cost: f64 },
    /// Only fares paying at least `min_margin` × total cost and reachable before they expire.
    Profitable { min_margin: f64 },
}
