use super::policy::BidPolicy;
use super::types::BidContext;

/// Bids on every fare it can reach.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unconditional;

impl BidPolicy for Unconditional {
    fn participate(&self, _ctx: &BidContext) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "unconditional"
    }
}

/// Bids only when the pickup leg is short enough.
#[derive(Debug, Clone, Copy)]
pub struct PickupRadius {
    pub max_pickup_cost: f64,
}

impl PickupRadius {
    pub fn new(max_pickup_cost: f64) -> Self {
        Self { max_pickup_cost }
    }
}

impl BidPolicy for PickupRadius {
    fn participate(&self, ctx: &BidContext) -> bool {
        ctx.pickup_cost <= self.max_pickup_cost
    }

    fn name(&self) -> &'static str {
        "pickup_radius"
    }
}

/// Bids only on fares that pay enough over the cost of serving them and that
/// the taxi can reach before the fare times out.
#[derive(Debug, Clone, Copy)]
pub struct Profitable {
    pub min_margin: f64,
}

impl Profitable {
    pub fn new(min_margin: f64) -> Self {
        Self { min_margin }
    }
}

impl Default for Profitable {
    fn default() -> Self {
        Self::new(1.5)
    }
}

impl BidPolicy for Profitable {
    fn participate(&self, ctx: &BidContext) -> bool {
        let pays = ctx.price >= ctx.total_cost() * self.min_margin;
        let in_time = ctx.now + ctx.ticks_to_pickup() <= ctx.open_until();
        pays && in_time
    }

    fn name(&self) -> &'static str {
        "profitable"
    }
}
