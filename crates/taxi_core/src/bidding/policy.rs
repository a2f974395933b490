use super::types::BidContext;

/// Decides whether a taxi bids on an open fare.
///
/// Policies are pure functions of the [`BidContext`]: they run in parallel
/// across taxis against a read-only snapshot, so implementations must be
/// `Send + Sync` and must not keep state between calls.
///
/// # Examples
///
/// ```rust
/// use taxi_core::bidding::{BidContext, BidPolicy, PickupRadius};
/// use taxi_core::ecs::{FareId, NodeId, TaxiId};
///
/// let policy = PickupRadius::new(3.0);
/// let ctx = BidContext {
///     taxi: TaxiId(0),
///     fare: FareId(0),
///     origin: NodeId(0),
///     destination: NodeId(2),
///     price: 5.5,
///     pickup_cost: 1.0,
///     trip_cost: 2.0,
///     now: 1,
///     open_since: 0,
///     max_open_duration: 30,
///     tick_duration_mins: 1.0,
/// };
/// assert!(policy.participate(&ctx));
/// ```
pub trait BidPolicy: Send + Sync {
    /// Returns `true` when the taxi should submit a bid for this fare.
    fn participate(&self, ctx: &BidContext) -> bool;

    /// Short name used in logs and experiment output.
    fn name(&self) -> &'static str;
}
