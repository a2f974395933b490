use std::collections::BTreeMap;
use std::path::Path;

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::bidding::BidPolicyKind;
use crate::ecs::NodeId;
use crate::error::ValidationError;
use crate::pricing::{PricingConfig, PricingPolicy};
use crate::traffic::{TrafficProfileKind, TrafficSettings};

/// Optional taxi shift model: running costs drain an account, fares refill it,
/// and a taxi whose account runs dry goes off duty once it is idle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DutyConfig {
    pub enabled: bool,
    pub shift_budget: f64,
    pub running_cost_per_tick: f64,
    /// Ticks spent off duty before returning with a refilled account. `None` = never return.
    pub off_duty_ticks: Option<u64>,
}

impl Default for DutyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            shift_budget: 256.0,
            running_cost_per_tick: 1.0,
            off_duty_ticks: None,
        }
    }
}

/// Simulation configuration. Every field has a default; JSON input may omit any of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Resource)]
#[serde(default)]
pub struct SimConfig {
    /// Minutes per tick. Also the travel budget, in cost units, a moving taxi gets per tick.
    pub tick_duration_mins: f64,
    /// Per-node probability of a new fare each tick.
    pub fare_arrival_rate: f64,
    /// Per-node overrides of `fare_arrival_rate`.
    pub node_arrival_rates: BTreeMap<NodeId, f64>,
    pub traffic_volatility: f64,
    /// Ticks a fare may stay Open before it expires.
    pub max_fare_open_duration: u64,
    pub taxi_count: u32,
    pub random_seed: u64,
    pub max_ticks: u64,
    /// Ticks an assigned taxi has to reach the pickup before the fare is reopened.
    pub pickup_timeout_ticks: u64,
    pub traffic_profile: TrafficProfileKind,
    pub min_traffic_factor: f64,
    pub max_traffic_factor: f64,
    pub reroute_threshold: f64,
    pub pricing: PricingConfig,
    pub bid_policy: BidPolicyKind,
    pub duty: DutyConfig,
    /// Starting junction per taxi (index = taxi id). Random when absent.
    pub taxi_start_nodes: Option<Vec<NodeId>>,
    pub route_cache_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_duration_mins: 1.0,
            fare_arrival_rate: 0.02,
            node_arrival_rates: BTreeMap::new(),
            traffic_volatility: 0.05,
            max_fare_open_duration: 30,
            taxi_count: 10,
            random_seed: 0,
            max_ticks: 1440,
            pickup_timeout_ticks: 60,
            traffic_profile: TrafficProfileKind::Flat,
            min_traffic_factor: 0.5,
            max_traffic_factor: 3.0,
            reroute_threshold: 0.1,
            pricing: PricingConfig::default(),
            bid_policy: BidPolicyKind::Unconditional,
            duty: DutyConfig::default(),
            taxi_start_nodes: None,
            route_cache_capacity: 4096,
        }
    }
}

fn check(ok: bool, message: impl FnOnce() -> String) -> Result<(), ValidationError> {
    if ok {
        Ok(())
    } else {
        Err(ValidationError::new(message()))
    }
}

fn is_probability(p: f64) -> bool {
    p.is_finite() && (0.0..=1.0).contains(&p)
}

fn is_non_negative(x: f64) -> bool {
    x.is_finite() && x >= 0.0
}

impl SimConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|err| ValidationError::new(format!("config is not valid JSON: {err}")))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ValidationError::new(format!("cannot read config file '{}': {err}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_taxi_count(mut self, count: u32) -> Self {
        self.taxi_count = count;
        self
    }

    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = ticks;
        self
    }

    pub fn with_fare_arrival_rate(mut self, rate: f64) -> Self {
        self.fare_arrival_rate = rate;
        self
    }

    pub fn with_node_arrival_rate(mut self, node: NodeId, rate: f64) -> Self {
        self.node_arrival_rates.insert(node, rate);
        self
    }

    pub fn with_traffic_volatility(mut self, volatility: f64) -> Self {
        self.traffic_volatility = volatility;
        self
    }

    pub fn with_traffic_profile(mut self, profile: TrafficProfileKind) -> Self {
        self.traffic_profile = profile;
        self
    }

    pub fn with_max_fare_open_duration(mut self, ticks: u64) -> Self {
        self.max_fare_open_duration = ticks;
        self
    }

    pub fn with_pickup_timeout(mut self, ticks: u64) -> Self {
        self.pickup_timeout_ticks = ticks;
        self
    }

    pub fn with_pricing(mut self, pricing: PricingConfig) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_bid_policy(mut self, policy: BidPolicyKind) -> Self {
        self.bid_policy = policy;
        self
    }

    pub fn with_duty(mut self, duty: DutyConfig) -> Self {
        self.duty = duty;
        self
    }

    pub fn with_tick_duration_mins(mut self, minutes: f64) -> Self {
        self.tick_duration_mins = minutes;
        self
    }

    /// Places taxi `i` at `nodes[i]` and sets the taxi count to match.
    pub fn with_taxi_start_nodes(mut self, nodes: Vec<NodeId>) -> Self {
        self.taxi_count = u32::try_from(nodes.len()).unwrap_or(u32::MAX);
        self.taxi_start_nodes = Some(nodes);
        self
    }

    pub fn arrival_rate_at(&self, node: NodeId) -> f64 {
        self.node_arrival_rates
            .get(&node)
            .copied()
            .unwrap_or(self.fare_arrival_rate)
    }

    pub fn traffic_settings(&self) -> TrafficSettings {
        TrafficSettings {
            volatility: self.traffic_volatility,
            min_factor: self.min_traffic_factor,
            max_factor: self.max_traffic_factor,
            reroute_threshold: self.reroute_threshold,
            tick_duration_mins: self.tick_duration_mins,
        }
    }

    /// Checks every parameter for range and consistency. Grid-dependent checks
    /// (start nodes, per-node overrides) happen when the world is built.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check(
            self.tick_duration_mins.is_finite() && self.tick_duration_mins > 0.0,
            || format!("tick_duration_mins must be positive, got {}", self.tick_duration_mins),
        )?;
        check(is_probability(self.fare_arrival_rate), || {
            format!("fare_arrival_rate must be within [0, 1], got {}", self.fare_arrival_rate)
        })?;
        for (node, rate) in &self.node_arrival_rates {
            check(is_probability(*rate), || {
                format!("arrival rate for node {node} must be within [0, 1], got {rate}")
            })?;
        }
        check(is_non_negative(self.traffic_volatility), || {
            format!("traffic_volatility must be non-negative, got {}", self.traffic_volatility)
        })?;
        check(
            self.min_traffic_factor.is_finite() && self.min_traffic_factor > 0.0,
            || format!("min_traffic_factor must be positive, got {}", self.min_traffic_factor),
        )?;
        check(
            self.max_traffic_factor.is_finite() && self.max_traffic_factor >= self.min_traffic_factor,
            || {
                format!(
                    "max_traffic_factor ({}) must be at least min_traffic_factor ({})",
                    self.max_traffic_factor, self.min_traffic_factor
                )
            },
        )?;
        check(is_non_negative(self.reroute_threshold), || {
            format!("reroute_threshold must be non-negative, got {}", self.reroute_threshold)
        })?;
        if let TrafficProfileKind::Custom(factors) = &self.traffic_profile {
            check(factors.iter().all(|f| f.is_finite() && *f > 0.0), || {
                "custom traffic profile factors must be positive".to_string()
            })?;
        }
        check(self.max_ticks > 0, || "max_ticks must be at least 1".to_string())?;
        check(self.pickup_timeout_ticks > 0, || {
            "pickup_timeout_ticks must be at least 1".to_string()
        })?;
        check(self.route_cache_capacity > 0, || {
            "route_cache_capacity must be at least 1".to_string()
        })?;

        check(
            is_non_negative(self.pricing.base_fare) && is_non_negative(self.pricing.per_cost_unit),
            || "pricing rates must be non-negative".to_string(),
        )?;
        if let PricingPolicy::SupplyAware { ceiling_multiple } = self.pricing.policy {
            check(ceiling_multiple.is_finite() && ceiling_multiple > 0.0, || {
                format!("pricing ceiling_multiple must be positive, got {ceiling_multiple}")
            })?;
        }

        match self.bid_policy {
            BidPolicyKind::Unconditional => {}
            BidPolicyKind::PickupRadius { max_pickup_cost } => {
                check(is_non_negative(max_pickup_cost), || {
                    format!("max_pickup_cost must be non-negative, got {max_pickup_cost}")
                })?;
            }
            BidPolicyKind::Profitable { min_margin } => {
                check(is_non_negative(min_margin), || {
                    format!("min_margin must be non-negative, got {min_margin}")
                })?;
            }
        }

        if self.duty.enabled {
            check(
                self.duty.shift_budget.is_finite() && self.duty.shift_budget > 0.0,
                || format!("duty shift_budget must be positive, got {}", self.duty.shift_budget),
            )?;
            check(is_non_negative(self.duty.running_cost_per_tick), || {
                "duty running_cost_per_tick must be non-negative".to_string()
            })?;
        }

        if let Some(nodes) = &self.taxi_start_nodes {
            check(nodes.len() == self.taxi_count as usize, || {
                format!(
                    "taxi_start_nodes lists {} nodes for {} taxis",
                    nodes.len(),
                    self.taxi_count
                )
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.taxi_count, 10);
        assert_eq!(config.max_ticks, 1440);
        assert_eq!(config.max_fare_open_duration, 30);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = SimConfig::from_json_str(r#"{"taxi_count": 3, "node_arrival_rates": {"4": 0.5}}"#)
            .expect("config");
        assert_eq!(config.taxi_count, 3);
        assert_eq!(config.arrival_rate_at(NodeId(4)), 0.5);
        assert_eq!(config.arrival_rate_at(NodeId(5)), 0.02);
        assert_eq!(config.pricing, PricingConfig::default());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let bad_rate = SimConfig::default().with_fare_arrival_rate(1.5);
        assert!(bad_rate.validate().unwrap_err().message().contains("fare_arrival_rate"));

        let bad_factors = SimConfig {
            min_traffic_factor: 2.0,
            max_traffic_factor: 1.0,
            ..SimConfig::default()
        };
        assert!(bad_factors.validate().is_err());

        let bad_tick = SimConfig::default().with_tick_duration_mins(0.0);
        assert!(bad_tick.validate().is_err());
    }

    #[test]
    fn start_nodes_must_match_taxi_count() {
        let mut config = SimConfig::default().with_taxi_start_nodes(vec![NodeId(0), NodeId(1)]);
        assert_eq!(config.taxi_count, 2);
        assert!(config.validate().is_ok());
        config.taxi_count = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn saturated_taxi_count_reports_start_node_mismatch() {
        let mut config = SimConfig::default().with_taxi_start_nodes(vec![NodeId(0)]);
        config.taxi_count = u32::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.message().contains(&format!("1 nodes for {} taxis", u32::MAX)));
    }
}
