//! Parameter spaces for sweeps.
//!
//! [`ParameterSpace::grid`] starts from a base [`SimConfig`] and a street grid;
//! every dimension left empty keeps the base value. [`ParameterSpace::generate`]
//! takes the Cartesian product of the dimensions that were set.

use taxi_core::bidding::BidPolicyKind;
use taxi_core::grid::GridDefinition;
use taxi_core::scenario::SimConfig;

/// One simulation run of a sweep.
#[derive(Debug, Clone)]
pub struct ParameterSet {
    /// Complete configuration for this run, seed included.
    pub config: SimConfig,
    /// Street grid shared by every run of the space.
    pub grid: GridDefinition,
    /// Identifies the parameter combination; runs differing only by seed share it.
    pub experiment_id: String,
    /// Index of the seed within its combination.
    pub run_id: usize,
    pub seed: u64,
}

impl ParameterSet {
    pub fn new(config: SimConfig, grid: GridDefinition, experiment_id: String, run_id: usize) -> Self {
        let seed = config.random_seed;
        Self {
            config,
            grid,
            experiment_id,
            run_id,
            seed,
        }
    }

    /// Short, stable name of the bid policy, used as a CSV column.
    pub fn bid_policy_label(&self) -> String {
        bid_policy_label(&self.config.bid_policy)
    }
}

pub fn bid_policy_label(policy: &BidPolicyKind) -> String {
    match policy {
        BidPolicyKind::Unconditional => "unconditional".to_string(),
        BidPolicyKind::PickupRadius { max_pickup_cost } => format!("pickup_radius({max_pickup_cost})"),
        BidPolicyKind::Profitable { min_margin } => format!("profitable({min_margin})"),
    }
}

/// Values to explore along each sweep dimension.
#[derive(Debug, Clone)]
pub struct ParameterSpace {
    base: SimConfig,
    grid: GridDefinition,
    taxi_counts: Vec<u32>,
    arrival_rates: Vec<f64>,
    volatilities: Vec<f64>,
    bid_policies: Vec<BidPolicyKind>,
    seeds: Vec<u64>,
}

impl Default for ParameterSpace {
    fn default() -> Self {
        Self {
            base: SimConfig::default().with_max_ticks(480),
            grid: GridDefinition::manhattan(8, 8, 1.0).unwrap_or_default(),
            taxi_counts: Vec::new(),
            arrival_rates: Vec::new(),
            volatilities: Vec::new(),
            bid_policies: Vec::new(),
            seeds: Vec::new(),
        }
    }
}

impl ParameterSpace {
    /// Grid search over an 8 × 8 Manhattan grid, 480 ticks per run.
    pub fn grid() -> Self {
        Self::default()
    }

    /// Values used for every dimension not set explicitly.
    pub fn base_config(mut self, config: SimConfig) -> Self {
        self.base = config;
        self
    }

    pub fn street_grid(mut self, grid: GridDefinition) -> Self {
        self.grid = grid;
        self
    }

    pub fn taxi_counts(mut self, counts: Vec<u32>) -> Self {
        self.taxi_counts = counts;
        self
    }

    pub fn arrival_rates(mut self, rates: Vec<f64>) -> Self {
        self.arrival_rates = rates;
        self
    }

    pub fn volatilities(mut self, volatilities: Vec<f64>) -> Self {
        self.volatilities = volatilities;
        self
    }

    pub fn bid_policies(mut self, policies: Vec<BidPolicyKind>) -> Self {
        self.bid_policies = policies;
        self
    }

    /// Seeds to repeat every combination with.
    pub fn seeds(mut self, seeds: Vec<u64>) -> Self {
        self.seeds = seeds;
        self
    }

    /// Number of runs `generate` will produce.
    pub fn len(&self) -> usize {
        self.variations().combination_count() * self.seeds_or_base().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expands the space into parameter sets, seeds varying fastest.
    ///
    /// Combinations whose configuration fails validation are skipped.
    pub fn generate(&self) -> Vec<ParameterSet> {
        let variations = self.variations();
        let seeds = self.seeds_or_base();
        let mut sets = Vec::with_capacity(variations.combination_count() * seeds.len());

        for (experiment, combo) in variations.combinations().enumerate() {
            let config = self
                .base
                .clone()
                .with_taxi_count(combo.taxi_count)
                .with_fare_arrival_rate(combo.arrival_rate)
                .with_traffic_volatility(combo.volatility)
                .with_bid_policy(combo.bid_policy);
            if let Err(err) = config.validate() {
                tracing::warn!(experiment, %err, "skipping invalid parameter combination");
                continue;
            }
            for (run_id, &seed) in seeds.iter().enumerate() {
                sets.push(ParameterSet::new(
                    config.clone().with_seed(seed),
                    self.grid.clone(),
                    format!("exp_{experiment}"),
                    run_id,
                ));
            }
        }
        sets
    }

    fn seeds_or_base(&self) -> Vec<u64> {
        or_base(&self.seeds, self.base.random_seed)
    }

    fn variations(&self) -> Variations {
        Variations {
            taxi_counts: or_base(&self.taxi_counts, self.base.taxi_count),
            arrival_rates: or_base(&self.arrival_rates, self.base.fare_arrival_rate),
            volatilities: or_base(&self.volatilities, self.base.traffic_volatility),
            bid_policies: or_base(&self.bid_policies, self.base.bid_policy),
        }
    }
}

fn or_base<T: Clone>(values: &[T], base: T) -> Vec<T> {
    if values.is_empty() {
        vec![base]
    } else {
        values.to_vec()
    }
}

#[derive(Debug, Clone, Copy)]
struct Combination {
    taxi_count: u32,
    arrival_rate: f64,
    volatility: f64,
    bid_policy: BidPolicyKind,
}

struct Variations {
    taxi_counts: Vec<u32>,
    arrival_rates: Vec<f64>,
    volatilities: Vec<f64>,
    bid_policies: Vec<BidPolicyKind>,
}

impl Variations {
    fn combination_count(&self) -> usize {
        self.taxi_counts.len() * self.arrival_rates.len() * self.volatilities.len() * self.bid_policies.len()
    }

    fn combinations(&self) -> impl Iterator<Item = Combination> + '_ {
        self.taxi_counts.iter().flat_map(move |&taxi_count| {
            self.arrival_rates.iter().flat_map(move |&arrival_rate| {
                self.volatilities.iter().flat_map(move |&volatility| {
                    self.bid_policies.iter().map(move |&bid_policy| Combination {
                        taxi_count,
                        arrival_rate,
                        volatility,
                        bid_policy,
                    })
                })
            })
        })
    }
}
