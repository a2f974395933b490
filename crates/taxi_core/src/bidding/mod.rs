//! Taxi bidding: the bid record and the policies deciding when a taxi bids.

pub mod policy;
pub mod strategies;
pub mod types;

use bevy_ecs::prelude::Resource;

pub use policy::BidPolicy;
pub use strategies::{PickupRadius, Profitable, Unconditional};
pub use types::{Bid, BidContext, BidPolicyKind, BidStamp};

/// Resource wrapper for the bid policy trait object.
#[derive(Resource)]
pub struct BidPolicyResource(pub Box<dyn BidPolicy>);

impl BidPolicyResource {
    pub fn new(policy: Box<dyn BidPolicy>) -> Self {
        Self(policy)
    }

    pub fn from_kind(kind: BidPolicyKind) -> Self {
        Self::new(build_bid_policy(kind))
    }
}

impl std::ops::Deref for BidPolicyResource {
    type Target = dyn BidPolicy;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

pub fn build_bid_policy(kind: BidPolicyKind) -> Box<dyn BidPolicy> {
    match kind {
        BidPolicyKind::Unconditional => Box::new(Unconditional),
        BidPolicyKind::PickupRadius { max_pickup_cost } => Box::new(PickupRadius::new(max_pickup_cost)),
        BidPolicyKind::Profitable { min_margin } => Box::new(Profitable::new(min_margin)),
    }
}
