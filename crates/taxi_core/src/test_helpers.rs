//! Shared fixtures for unit and integration tests.

use crate::ecs::NodeId;
use crate::grid::{CityGrid, EdgeDef, GridDefinition, NodeDef};
use crate::scenario::SimConfig;
use crate::traffic::{TrafficProfile, TrafficSettings, TrafficState};

/// Junctions A (0), B (1) and C (2): A–B and B–C cost 1, A–C costs 5.
pub fn triangle_definition() -> GridDefinition {
    let node = |id: u32, x: f64, y: f64| NodeDef { id: NodeId(id), x, y };
    let edge = |from: u32, to: u32, base_cost: f64| EdgeDef {
        from: NodeId(from),
        to: NodeId(to),
        base_cost,
        directed: false,
    };
    GridDefinition {
        nodes: vec![node(0, 0.0, 0.0), node(1, 1.0, 0.0), node(2, 2.0, 0.0)],
        edges: vec![edge(0, 1, 1.0), edge(1, 2, 1.0), edge(0, 2, 5.0)],
    }
}

pub fn triangle_grid() -> CityGrid {
    CityGrid::from_definition(&triangle_definition()).expect("triangle grid is valid")
}

/// Free-flowing traffic that never changes.
pub fn triangle_traffic(grid: &CityGrid) -> TrafficState {
    let settings = TrafficSettings {
        volatility: 0.0,
        ..TrafficSettings::default()
    };
    TrafficState::new(grid, settings, TrafficProfile::flat())
}

/// No random fares, no traffic noise, no taxis: scenarios add what they need.
pub fn quiet_config() -> SimConfig {
    SimConfig::default()
        .with_fare_arrival_rate(0.0)
        .with_traffic_volatility(0.0)
        .with_taxi_count(0)
}
