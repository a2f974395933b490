//! Fare pricing: a fixed policy chosen at configuration time.

use serde::{Deserialize, Serialize};

/// Base fare in currency units.
pub const BASE_FARE: f64 = 2.50;

/// Rate per unit of route cost.
pub const PER_COST_UNIT_RATE: f64 = 1.50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum PricingPolicy {
    /// `base_fare + per_cost_unit × route cost`.
    #[default]
    Linear,
    /// Linear price scaled by demand over supply, capped at `ceiling_multiple × route cost`.
    SupplyAware { ceiling_multiple: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub policy: PricingPolicy,
    pub base_fare: f64,
    pub per_cost_unit: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            policy: PricingPolicy::Linear,
            base_fare: BASE_FARE,
            per_cost_unit: PER_COST_UNIT_RATE,
        }
    }
}

impl PricingConfig {
    /// Price of a fare whose route costs `route_cost`.
    ///
    /// `open_fares` counts fares waiting for a taxi including this one;
    /// `on_duty_taxis` counts taxis not off duty. Only `SupplyAware` uses them.
    pub fn quote(&self, route_cost: f64, open_fares: usize, on_duty_taxis: usize) -> f64 {
        let linear = self.base_fare + self.per_cost_unit * route_cost;
        match self.policy {
            PricingPolicy::Linear => linear,
            PricingPolicy::SupplyAware { ceiling_multiple } => {
                let supply = on_duty_taxis.max(1) as f64;
                let ratio = (open_fares as f64 / supply).max(1.0);
                (linear * ratio)
                    .min(ceiling_multiple * route_cost)
                    .max(self.base_fare)
            }
        }
    }
}
