//! Traffic model: time-of-day cost bands and per-node congestion.
//!
//! Each junction carries a congestion level that follows a bounded random walk.
//! A street's multiplier is the time-of-day band times the mean level of its two
//! endpoints, clamped to `[min_factor, max_factor]`. Multipliers scale base edge
//! costs, so 1.0 is free flow and larger values are slower.
//!
//! The model also tracks the traffic *epoch*: it advances when any street's
//! multiplier has drifted more than `reroute_threshold` (relative) from its value
//! at the start of the epoch. Cached routes and planned taxi routes are tied to it.

use bevy_ecs::prelude::Resource;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ecs::{EdgeId, NodeId};
use crate::grid::CityGrid;

// ---------------------------------------------------------------------------
// Traffic profile (time-of-day cost factors)
// ---------------------------------------------------------------------------

/// Pre-defined time-of-day profiles.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub enum TrafficProfileKind {
    /// No time-of-day effect; all hourly factors are 1.0.
    #[default]
    Flat,
    /// Morning and evening peaks.
    RushHour,
    /// Custom per-hour cost factors (index 0 = midnight, index 23 = 11 PM).
    Custom([f64; 24]),
}

/// Hourly cost multipliers. 1.0 = free flow; 1.8 = heavy congestion.
#[derive(Clone, Debug, PartialEq)]
pub struct TrafficProfile {
    pub hourly_factors: [f64; 24],
}

impl TrafficProfile {
    pub fn flat() -> Self {
        Self {
            hourly_factors: [1.0; 24],
        }
    }

    /// - 00–06: 1.0 (free flow)
    /// - 07–08: 1.8 (morning rush)
    /// - 09–15: 1.3 (midday)
    /// - 16–18: 1.9 (evening rush)
    /// - 19–23: 1.2 (evening)
    pub fn rush_hour() -> Self {
        let mut f = [1.0_f64; 24];
        f[7] = 1.8;
        f[8] = 1.8;
        for slot in &mut f[9..16] {
            *slot = 1.3;
        }
        for slot in &mut f[16..19] {
            *slot = 1.9;
        }
        for slot in &mut f[19..24] {
            *slot = 1.2;
        }
        Self { hourly_factors: f }
    }

    pub fn from_kind(kind: &TrafficProfileKind) -> Self {
        match kind {
            TrafficProfileKind::Flat => Self::flat(),
            TrafficProfileKind::RushHour => Self::rush_hour(),
            TrafficProfileKind::Custom(factors) => Self {
                hourly_factors: *factors,
            },
        }
    }

    pub fn factor_at_hour(&self, hour: usize) -> f64 {
        self.hourly_factors[hour % 24]
    }
}

impl Default for TrafficProfile {
    fn default() -> Self {
        Self::flat()
    }
}

/// Hour of day (0–23) reached after `tick` ticks of `tick_duration_mins` each.
pub fn hour_of_day(tick: u64, tick_duration_mins: f64) -> usize {
    let minutes = tick as f64 * tick_duration_mins;
    ((minutes / 60.0).floor() as u64 % 24) as usize
}

// ---------------------------------------------------------------------------
// Congestion state
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrafficSettings {
    /// Largest per-tick change of a node's congestion level.
    pub volatility: f64,
    pub min_factor: f64,
    pub max_factor: f64,
    /// Relative drift of any street multiplier that starts a new epoch.
    pub reroute_threshold: f64,
    pub tick_duration_mins: f64,
}

impl Default for TrafficSettings {
    fn default() -> Self {
        Self {
            volatility: 0.05,
            min_factor: 0.5,
            max_factor: 3.0,
            reroute_threshold: 0.1,
            tick_duration_mins: 1.0,
        }
    }
}

#[derive(Debug, Clone, Resource)]
pub struct TrafficState {
    settings: TrafficSettings,
    profile: TrafficProfile,
    band: f64,
    /// Per node index.
    levels: Vec<f64>,
    /// Per edge id.
    multipliers: Vec<f64>,
    costs: Vec<f64>,
    base_costs: Vec<f64>,
    endpoints: Vec<(usize, usize)>,
    epoch: u64,
    epoch_baseline: Vec<f64>,
}

impl TrafficState {
    pub fn new(grid: &CityGrid, settings: TrafficSettings, profile: TrafficProfile) -> Self {
        let level = 1.0_f64.clamp(settings.min_factor, settings.max_factor);
        let endpoints = grid
            .edges()
            .iter()
            .map(|e| {
                (
                    grid.node_index(e.a).unwrap_or(0),
                    grid.node_index(e.b).unwrap_or(0),
                )
            })
            .collect();
        let mut state = Self {
            band: profile.factor_at_hour(0),
            settings,
            profile,
            levels: vec![level; grid.node_count()],
            multipliers: vec![1.0; grid.edge_count()],
            costs: vec![0.0; grid.edge_count()],
            base_costs: grid.edges().iter().map(|e| e.base_cost).collect(),
            endpoints,
            epoch: 0,
            epoch_baseline: Vec::new(),
        };
        state.recompute_edges();
        state.epoch_baseline = state.multipliers.clone();
        state
    }

    /// Advances congestion to `tick`. Returns `true` when a new epoch began.
    ///
    /// Draws one random step per node, in node-id order, unless volatility is zero.
    pub fn tick<R: Rng + ?Sized>(&mut self, tick: u64, rng: &mut R) -> bool {
        let hour = hour_of_day(tick, self.settings.tick_duration_mins);
        self.band = self.profile.factor_at_hour(hour);

        let volatility = self.settings.volatility;
        if volatility > 0.0 {
            for level in &mut self.levels {
                let step = rng.gen_range(-volatility..=volatility);
                *level = (*level + step).clamp(self.settings.min_factor, self.settings.max_factor);
            }
        }
        self.recompute_edges();

        let threshold = self.settings.reroute_threshold;
        let drifted = self
            .multipliers
            .iter()
            .zip(&self.epoch_baseline)
            .any(|(now, base)| ((now - base) / base).abs() > threshold);
        if drifted {
            self.epoch += 1;
            self.epoch_baseline.clone_from(&self.multipliers);
        }
        drifted
    }

    fn recompute_edges(&mut self) {
        for (i, &(a, b)) in self.endpoints.iter().enumerate() {
            let mean = (self.levels[a] + self.levels[b]) / 2.0;
            let m = (self.band * mean).clamp(self.settings.min_factor, self.settings.max_factor);
            self.multipliers[i] = m;
            self.costs[i] = self.base_costs[i] * m;
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn band(&self) -> f64 {
        self.band
    }

    pub fn settings(&self) -> &TrafficSettings {
        &self.settings
    }

    pub fn edge_multiplier(&self, edge: EdgeId) -> f64 {
        self.multipliers.get(edge.0 as usize).copied().unwrap_or(1.0)
    }

    /// Base cost × current multiplier.
    pub fn edge_cost(&self, edge: EdgeId) -> f64 {
        self.costs.get(edge.0 as usize).copied().unwrap_or(0.0)
    }

    pub fn edge_multipliers(&self) -> &[f64] {
        &self.multipliers
    }

    /// Band × congestion level of one junction.
    pub fn node_multiplier(&self, grid: &CityGrid, node: NodeId) -> Option<f64> {
        grid.node_index(node).map(|i| self.band * self.levels[i])
    }
}
