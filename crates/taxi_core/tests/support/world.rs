#![allow(dead_code)]

use bevy_ecs::prelude::World;
use taxi_core::ecs::{FareId, NodeId};
use taxi_core::fares::FareBoard;
use taxi_core::grid::{CityGrid, EdgeDef, GridDefinition, NodeDef};
use taxi_core::scenario::{build_world, SimConfig};
use taxi_core::test_helpers::{quiet_config, triangle_definition};

/// Straight street 0 – 1 – … – (n-1), every block costing 1.
pub fn line_definition(nodes: u32) -> GridDefinition {
    GridDefinition {
        nodes: (0..nodes)
            .map(|id| NodeDef {
                id: NodeId(id),
                x: f64::from(id),
                y: 0.0,
            })
            .collect(),
        edges: (1..nodes)
            .map(|id| EdgeDef {
                from: NodeId(id - 1),
                to: NodeId(id),
                base_cost: 1.0,
                directed: false,
            })
            .collect(),
    }
}

/// Builder for reproducible test worlds on a small grid.
#[derive(Debug, Clone)]
pub struct TestWorldBuilder {
    grid: GridDefinition,
    config: SimConfig,
    fares: Vec<(NodeId, NodeId, f64)>,
}

impl Default for TestWorldBuilder {
    fn default() -> Self {
        Self {
            grid: triangle_definition(),
            config: quiet_config(),
            fares: Vec::new(),
        }
    }
}

impl TestWorldBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grid(mut self, grid: GridDefinition) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_taxis_at(mut self, nodes: &[u32]) -> Self {
        self.config = self
            .config
            .with_taxi_start_nodes(nodes.iter().copied().map(NodeId).collect());
        self
    }

    /// Queue an Open fare created at tick 0.
    pub fn with_fare(mut self, origin: u32, destination: u32, price: f64) -> Self {
        self.fares.push((NodeId(origin), NodeId(destination), price));
        self
    }

    pub fn build(self) -> World {
        let grid = CityGrid::from_definition(&self.grid).expect("test grid");
        let mut world = World::new();
        build_world(&mut world, &self.config, grid).expect("test world");
        let mut board = world.resource_mut::<FareBoard>();
        for (origin, destination, price) in self.fares {
            board.create(origin, destination, price, 0.0, 0);
        }
        world
    }
}

pub fn fare(id: u64) -> FareId {
    FareId(id)
}
