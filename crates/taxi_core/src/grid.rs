//! City grid: junctions (nodes) joined by streets (edges) with base traversal costs.
//!
//! A [`GridDefinition`] is the serializable input; [`CityGrid`] is the validated,
//! indexed form stored as an ECS resource. Topology never changes during a run;
//! congestion lives in [`crate::traffic::TrafficState`].

use std::collections::HashMap;
use std::path::Path;

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::ecs::{EdgeId, NodeId};
use crate::error::ValidationError;
use crate::routing::RouteLeg;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDef {
    pub from: NodeId,
    pub to: NodeId,
    pub base_cost: f64,
    /// One-way street when true; traversable both ways otherwise.
    #[serde(default)]
    pub directed: bool,
}

/// Largest junction count [`GridDefinition::manhattan`] will generate.
pub const MAX_MANHATTAN_NODES: u32 = 1 << 20;

/// Serializable grid input: node list and edge list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridDefinition {
    pub nodes: Vec<NodeDef>,
    pub edges: Vec<EdgeDef>,
}

impl GridDefinition {
    pub fn from_json_str(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|err| ValidationError::new(format!("grid definition is not valid JSON: {err}")))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ValidationError::new(format!("cannot read grid file '{}': {err}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Rectangular street grid, `width` × `height` junctions, every block costing `base_cost`.
    ///
    /// Node ids run row by row: the junction at column `x`, row `y` is `y * width + x`.
    /// Fails for an empty grid or one with more than [`MAX_MANHATTAN_NODES`] junctions.
    pub fn manhattan(width: u32, height: u32, base_cost: f64) -> Result<Self, ValidationError> {
        let size = width
            .checked_mul(height)
            .filter(|n| (1..=MAX_MANHATTAN_NODES).contains(n))
            .ok_or_else(|| {
                ValidationError::new(format!(
                    "manhattan grid {width}x{height} must have between 1 and \
                     {MAX_MANHATTAN_NODES} junctions"
                ))
            })?;
        let mut nodes = Vec::with_capacity(size as usize);
        let mut edges = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let id = y * width + x;
                nodes.push(NodeDef {
                    id: NodeId(id),
                    x: x as f64,
                    y: y as f64,
                });
                if x + 1 < width {
                    edges.push(EdgeDef {
                        from: NodeId(id),
                        to: NodeId(id + 1),
                        base_cost,
                        directed: false,
                    });
                }
                if y + 1 < height {
                    edges.push(EdgeDef {
                        from: NodeId(id),
                        to: NodeId(id + width),
                        base_cost,
                        directed: false,
                    });
                }
            }
        }
        Ok(Self { nodes, edges })
    }

    /// Checks ids, endpoints and costs without building the indexed grid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.nodes.is_empty() {
            return Err(ValidationError::new("grid must contain at least one node"));
        }

        let mut seen = HashMap::with_capacity(self.nodes.len());
        for (position, node) in self.nodes.iter().enumerate() {
            if let Some(first) = seen.insert(node.id, position) {
                return Err(ValidationError::new(format!(
                    "duplicate node id {} (entries {first} and {position})",
                    node.id
                )));
            }
            if !node.x.is_finite() || !node.y.is_finite() {
                return Err(ValidationError::new(format!(
                    "node {} has a non-finite position",
                    node.id
                )));
            }
        }

        for (index, edge) in self.edges.iter().enumerate() {
            for endpoint in [edge.from, edge.to] {
                if !seen.contains_key(&endpoint) {
                    return Err(ValidationError::new(format!(
                        "edge {index} references unknown node {endpoint}"
                    )));
                }
            }
            if edge.from == edge.to {
                return Err(ValidationError::new(format!(
                    "edge {index} is a self-loop on node {}",
                    edge.from
                )));
            }
            if !edge.base_cost.is_finite() {
                return Err(ValidationError::new(format!(
                    "edge {index} has a non-finite base cost"
                )));
            }
            if edge.base_cost < 0.0 {
                return Err(ValidationError::new(format!(
                    "edge {index} has negative base cost {}",
                    edge.base_cost
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub a: NodeId,
    pub b: NodeId,
    pub base_cost: f64,
    pub directed: bool,
}

/// Validated, indexed city grid.
#[derive(Debug, Clone, Resource)]
pub struct CityGrid {
    /// Sorted by node id.
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
    edges: Vec<Edge>,
    /// Outgoing legs per node index, sorted by destination id then edge id.
    adjacency: Vec<Vec<RouteLeg>>,
}

impl CityGrid {
    pub fn from_definition(definition: &GridDefinition) -> Result<Self, ValidationError> {
        definition.validate()?;

        let mut nodes: Vec<Node> = definition
            .nodes
            .iter()
            .map(|n| Node {
                id: n.id,
                x: n.x,
                y: n.y,
            })
            .collect();
        nodes.sort_by_key(|n| n.id);
        let index: HashMap<NodeId, usize> =
            nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();

        let mut adjacency = vec![Vec::new(); nodes.len()];
        let mut edges = Vec::with_capacity(definition.edges.len());
        for (i, def) in definition.edges.iter().enumerate() {
            let id = EdgeId(i as u32);
            edges.push(Edge {
                id,
                a: def.from,
                b: def.to,
                base_cost: def.base_cost,
                directed: def.directed,
            });
            adjacency[index[&def.from]].push(RouteLeg {
                edge: id,
                from: def.from,
                to: def.to,
            });
            if !def.directed {
                adjacency[index[&def.to]].push(RouteLeg {
                    edge: id,
                    from: def.to,
                    to: def.from,
                });
            }
        }
        for legs in &mut adjacency {
            legs.sort_by_key(|leg| (leg.to, leg.edge));
        }

        Ok(Self {
            nodes,
            index,
            edges,
            adjacency,
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|n| n.id)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.index.contains_key(&node)
    }

    /// Dense index of a node (its rank by id).
    pub fn node_index(&self, node: NodeId) -> Option<usize> {
        self.index.get(&node).copied()
    }

    pub fn node(&self, node: NodeId) -> Option<&Node> {
        self.node_index(node).map(|i| &self.nodes[i])
    }

    pub fn edge(&self, edge: EdgeId) -> Option<&Edge> {
        self.edges.get(edge.0 as usize)
    }

    /// Streets leaving `node`, in ascending destination order.
    pub fn outgoing(&self, node: NodeId) -> &[RouteLeg] {
        match self.node_index(node) {
            Some(i) => &self.adjacency[i],
            None => &[],
        }
    }

    /// Straight-line distance between two junctions.
    pub fn distance(&self, a: NodeId, b: NodeId) -> Option<f64> {
        let a = self.node(a)?;
        let b = self.node(b)?;
        Some(((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u32) -> NodeDef {
        NodeDef {
            id: NodeId(id),
            x: id as f64,
            y: 0.0,
        }
    }

    fn edge(from: u32, to: u32, cost: f64) -> EdgeDef {
        EdgeDef {
            from: NodeId(from),
            to: NodeId(to),
            base_cost: cost,
            directed: false,
        }
    }

    #[test]
    fn rejects_duplicate_node_ids() {
        let def = GridDefinition {
            nodes: vec![node(1), node(1)],
            edges: vec![],
        };
        let err = def.validate().expect_err("duplicate ids");
        assert!(err.message().contains("duplicate node id 1"));
    }

    #[test]
    fn rejects_dangling_edge() {
        let def = GridDefinition {
            nodes: vec![node(0), node(1)],
            edges: vec![edge(0, 5, 1.0)],
        };
        let err = CityGrid::from_definition(&def).expect_err("dangling edge");
        assert!(err.message().contains("unknown node 5"));
    }

    #[test]
    fn rejects_negative_cost() {
        let def = GridDefinition {
            nodes: vec![node(0), node(1)],
            edges: vec![edge(0, 1, -2.0)],
        };
        let err = def.validate().expect_err("negative cost");
        assert!(err.message().contains("negative base cost"));
    }

    #[test]
    fn rejects_empty_grid() {
        assert!(GridDefinition::default().validate().is_err());
    }

    #[test]
    fn undirected_edges_are_traversable_both_ways() {
        let def = GridDefinition {
            nodes: vec![node(2), node(0), node(1)],
            edges: vec![edge(0, 1, 1.0), edge(1, 2, 1.0)],
        };
        let grid = CityGrid::from_definition(&def).expect("grid");
        assert_eq!(grid.node_ids().collect::<Vec<_>>(), vec![NodeId(0), NodeId(1), NodeId(2)]);
        let from_one: Vec<NodeId> = grid.outgoing(NodeId(1)).iter().map(|l| l.to).collect();
        assert_eq!(from_one, vec![NodeId(0), NodeId(2)]);
    }

    #[test]
    fn directed_edges_are_one_way() {
        let mut one_way = edge(0, 1, 1.0);
        one_way.directed = true;
        let def = GridDefinition {
            nodes: vec![node(0), node(1)],
            edges: vec![one_way],
        };
        let grid = CityGrid::from_definition(&def).expect("grid");
        assert_eq!(grid.outgoing(NodeId(0)).len(), 1);
        assert!(grid.outgoing(NodeId(1)).is_empty());
    }

    #[test]
    fn manhattan_grid_has_expected_shape() {
        let def = GridDefinition::manhattan(3, 2, 1.0).expect("3x2 grid");
        assert_eq!(def.nodes.len(), 6);
        // 2 horizontal per row * 2 rows + 3 vertical
        assert_eq!(def.edges.len(), 7);
        let grid = CityGrid::from_definition(&def).expect("grid");
        assert_eq!(grid.outgoing(NodeId(4)).len(), 3);
        assert_eq!(grid.distance(NodeId(0), NodeId(5)), Some(5.0_f64.sqrt()));
    }

    #[test]
    fn manhattan_rejects_empty_and_oversized_grids() {
        let err = GridDefinition::manhattan(70_000, 70_000, 1.0).unwrap_err();
        assert!(err.message().contains("70000x70000"));
        assert!(GridDefinition::manhattan(u32::MAX, 2, 1.0).is_err());
        assert!(GridDefinition::manhattan(0, 5, 1.0).is_err());
        assert!(GridDefinition::manhattan(MAX_MANHATTAN_NODES + 1, 1, 1.0).is_err());
    }

    #[test]
    fn parses_json_with_default_direction() {
        let json = r#"{
            "nodes": [{"id": 0, "x": 0.0, "y": 0.0}, {"id": 1, "x": 1.0, "y": 0.0}],
            "edges": [{"from": 0, "to": 1, "base_cost": 2.5}]
        }"#;
        let def = GridDefinition::from_json_str(json).expect("json");
        assert!(!def.edges[0].directed);
        assert_eq!(def.edges[0].base_cost, 2.5);
    }
}
