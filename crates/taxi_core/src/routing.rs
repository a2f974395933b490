//! Route planning over the city grid under current traffic.
//!
//! [`Router`] runs Dijkstra over traffic-adjusted edge costs. Costs are compared
//! as fixed-point integers so equal-cost alternatives are detected exactly; the
//! frontier pops the lowest `(cost, node id)` and an equal-cost relaxation keeps
//! the predecessor with the lower node id. Routes are memoised in a
//! [`RouteCache`] keyed to the traffic epoch.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bevy_ecs::prelude::Resource;
use lru::LruCache;
use pathfinding::directed::bfs::bfs_reach;
use serde::Serialize;

use crate::ecs::{EdgeId, GridPosition, NodeId};
use crate::error::NoPathError;
use crate::grid::CityGrid;
use crate::traffic::TrafficState;

/// Fixed-point scale for comparing path costs.
pub const COST_SCALE: f64 = 1000.0;

/// Budget left below this is treated as exhausted.
const BUDGET_EPSILON: f64 = 1e-9;

fn to_fixed(cost: f64) -> u64 {
    (cost * COST_SCALE).round() as u64
}

/// One street traversed in a given direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RouteLeg {
    pub edge: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub origin: NodeId,
    pub destination: NodeId,
    pub legs: Vec<RouteLeg>,
    pub total_cost: f64,
}

impl Route {
    /// Zero-length route for a taxi already standing at its target.
    pub fn stationary(node: NodeId) -> Self {
        Self {
            origin: node,
            destination: node,
            legs: Vec::new(),
            total_cost: 0.0,
        }
    }

    /// Junctions visited, origin first.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes = Vec::with_capacity(self.legs.len() + 1);
        nodes.push(self.origin);
        nodes.extend(self.legs.iter().map(|leg| leg.to));
        nodes
    }
}

/// Result of moving a taxi along its route for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Advance {
    pub position: GridPosition,
    pub legs_completed: usize,
    pub arrived: bool,
}

struct CachedRoutes {
    epoch: u64,
    /// `None` records a disconnected pair; topology never changes during a run.
    entries: LruCache<(NodeId, NodeId), Option<Arc<[RouteLeg]>>>,
}

/// LRU route and reachability cache shared by all route queries.
///
/// Route entries belong to one traffic epoch and are dropped when the epoch
/// advances. Reachability depends only on topology and survives epochs.
#[derive(Resource)]
pub struct RouteCache {
    routes: Mutex<CachedRoutes>,
    reachable: Mutex<LruCache<NodeId, Arc<[NodeId]>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RouteCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            routes: Mutex::new(CachedRoutes {
                epoch: 0,
                entries: LruCache::new(capacity),
            }),
            reachable: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Drops all cached routes if `epoch` differs from the one they were computed in.
    pub fn sync_epoch(&self, epoch: u64) {
        if let Ok(mut routes) = self.routes.lock() {
            if routes.epoch != epoch {
                routes.entries.clear();
                routes.epoch = epoch;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.routes.lock().map(|r| r.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(hits, misses)` over the lifetime of the cache.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    fn lookup(&self, epoch: u64, key: (NodeId, NodeId)) -> Option<Option<Arc<[RouteLeg]>>> {
        let mut routes = self.routes.lock().ok()?;
        if routes.epoch != epoch {
            routes.entries.clear();
            routes.epoch = epoch;
            return None;
        }
        let found = routes.entries.get(&key).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    fn store(&self, epoch: u64, key: (NodeId, NodeId), legs: Option<Arc<[RouteLeg]>>) {
        if let Ok(mut routes) = self.routes.lock() {
            if routes.epoch == epoch {
                routes.entries.put(key, legs);
            }
        }
    }
}

impl Default for RouteCache {
    fn default() -> Self {
        Self::new(4096)
    }
}

/// Nodes reachable from `origin` (including it), ascending by id.
pub fn reachable_from(grid: &CityGrid, cache: Option<&RouteCache>, origin: NodeId) -> Arc<[NodeId]> {
    if let Some(cache) = cache {
        if let Ok(mut reachable) = cache.reachable.lock() {
            if let Some(hit) = reachable.get(&origin) {
                return Arc::clone(hit);
            }
        }
    }

    let mut nodes: Vec<NodeId> = if grid.contains(origin) {
        bfs_reach(origin, |node| grid.outgoing(*node).iter().map(|leg| leg.to)).collect()
    } else {
        Vec::new()
    };
    nodes.sort_unstable();
    let nodes: Arc<[NodeId]> = nodes.into();

    if let Some(cache) = cache {
        if let Ok(mut reachable) = cache.reachable.lock() {
            reachable.put(origin, Arc::clone(&nodes));
        }
    }
    nodes
}

/// Single-source shortest paths from one node to every reachable node.
pub struct ShortestPathTree<'a> {
    grid: &'a CityGrid,
    origin: NodeId,
    cost: Vec<Option<f64>>,
    pred: Vec<Option<RouteLeg>>,
}

impl<'a> ShortestPathTree<'a> {
    pub fn origin(&self) -> NodeId {
        self.origin
    }

    pub fn cost_to(&self, node: NodeId) -> Option<f64> {
        self.grid.node_index(node).and_then(|i| self.cost[i])
    }

    pub fn route_to(&self, node: NodeId) -> Option<Route> {
        let total_cost = self.cost_to(node)?;
        let mut legs = Vec::new();
        let mut cursor = node;
        while cursor != self.origin {
            let leg = self.pred[self.grid.node_index(cursor)?]?;
            legs.push(leg);
            cursor = leg.from;
            if legs.len() > self.grid.node_count() {
                return None;
            }
        }
        legs.reverse();
        Some(Route {
            origin: self.origin,
            destination: node,
            legs,
            total_cost,
        })
    }
}

/// Route queries against one grid under the current traffic state.
#[derive(Clone, Copy)]
pub struct Router<'a> {
    grid: &'a CityGrid,
    traffic: &'a TrafficState,
    cache: Option<&'a RouteCache>,
}

impl<'a> Router<'a> {
    pub fn new(grid: &'a CityGrid, traffic: &'a TrafficState) -> Self {
        Self {
            grid,
            traffic,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: &'a RouteCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn grid(&self) -> &'a CityGrid {
        self.grid
    }

    /// Traffic-adjusted cost of traversing a leg right now.
    pub fn leg_cost(&self, leg: &RouteLeg) -> f64 {
        self.traffic.edge_cost(leg.edge)
    }

    /// Current cost of a sequence of legs.
    pub fn path_cost(&self, legs: &[RouteLeg]) -> f64 {
        legs.iter().map(|leg| self.leg_cost(leg)).sum()
    }

    /// Cheapest route between two nodes under current traffic.
    ///
    /// Within one traffic epoch a cached path is reused; its cost is always
    /// re-evaluated against the current multipliers.
    pub fn shortest_path(&self, origin: NodeId, destination: NodeId) -> Result<Route, NoPathError> {
        let no_path = NoPathError {
            from: origin,
            to: destination,
        };
        if !self.grid.contains(origin) || !self.grid.contains(destination) {
            return Err(no_path);
        }
        if origin == destination {
            return Ok(Route::stationary(origin));
        }

        let epoch = self.traffic.epoch();
        let key = (origin, destination);
        if let Some(cached) = self.cache.and_then(|c| c.lookup(epoch, key)) {
            let legs = cached.ok_or(no_path)?;
            return Ok(Route {
                origin,
                destination,
                total_cost: self.path_cost(&legs),
                legs: legs.to_vec(),
            });
        }

        let route = self.search(origin, Some(destination)).route_to(destination);
        if let Some(cache) = self.cache {
            cache.store(
                epoch,
                key,
                route.as_ref().map(|r| Arc::from(r.legs.as_slice())),
            );
        }
        route.ok_or(no_path)
    }

    /// Route from wherever a taxi is to `target`. A taxi part-way along a street
    /// finishes that street first.
    pub fn plan_from(&self, position: GridPosition, target: NodeId) -> Result<Route, NoPathError> {
        match position {
            GridPosition::Node { node } => self.shortest_path(node, target),
            GridPosition::Edge { leg, .. } => {
                let rest = self.shortest_path(leg.to, target)?;
                let mut legs = Vec::with_capacity(rest.legs.len() + 1);
                legs.push(leg);
                legs.extend(rest.legs);
                Ok(Route {
                    origin: leg.from,
                    destination: target,
                    legs,
                    total_cost: self.remaining_on_leg(position) + rest.total_cost,
                })
            }
        }
    }

    /// Cost still to travel before a taxi stands at its anchor node.
    pub fn remaining_on_leg(&self, position: GridPosition) -> f64 {
        match position {
            GridPosition::Node { .. } => 0.0,
            GridPosition::Edge { leg, progress } => (1.0 - progress) * self.leg_cost(&leg),
        }
    }

    /// Full shortest-path tree from `origin`; does not touch the cache.
    pub fn tree(&self, origin: NodeId) -> ShortestPathTree<'a> {
        self.search(origin, None)
    }

    fn search(&self, origin: NodeId, target: Option<NodeId>) -> ShortestPathTree<'a> {
        let n = self.grid.node_count();
        let mut tree = ShortestPathTree {
            grid: self.grid,
            origin,
            cost: vec![None; n],
            pred: vec![None; n],
        };
        let Some(start) = self.grid.node_index(origin) else {
            return tree;
        };

        let mut fixed: Vec<Option<u64>> = vec![None; n];
        let mut settled = vec![false; n];
        let mut frontier = BinaryHeap::new();
        fixed[start] = Some(0);
        tree.cost[start] = Some(0.0);
        frontier.push(Reverse((0_u64, origin)));

        while let Some(Reverse((dist, node))) = frontier.pop() {
            let Some(i) = self.grid.node_index(node) else {
                continue;
            };
            if settled[i] {
                continue;
            }
            settled[i] = true;
            if target == Some(node) {
                break;
            }
            let here = tree.cost[i].unwrap_or(0.0);

            for leg in self.grid.outgoing(node) {
                let Some(j) = self.grid.node_index(leg.to) else {
                    continue;
                };
                if settled[j] {
                    continue;
                }
                let weight = self.leg_cost(leg);
                let candidate = dist + to_fixed(weight);
                match fixed[j] {
                    Some(current) if candidate > current => {}
                    Some(current) if candidate == current => {
                        let lower = tree.pred[j].map_or(true, |p| (leg.from, leg.edge) < (p.from, p.edge));
                        if lower {
                            tree.pred[j] = Some(*leg);
                            tree.cost[j] = Some(here + weight);
                        }
                    }
                    _ => {
                        fixed[j] = Some(candidate);
                        tree.cost[j] = Some(here + weight);
                        tree.pred[j] = Some(*leg);
                        frontier.push(Reverse((candidate, leg.to)));
                    }
                }
            }
        }
        tree
    }

    /// Moves a taxi along `remaining` legs by `budget` cost units.
    ///
    /// When `position` is part-way along a street, that street must be the first
    /// remaining leg. Arrival is reported once every remaining leg is completed.
    pub fn advance(&self, position: GridPosition, remaining: &[RouteLeg], mut budget: f64) -> Advance {
        let mut position = position;
        let mut legs_completed = 0;

        for leg in remaining {
            let progress = match position {
                GridPosition::Edge { leg: current, progress } if current == *leg => progress,
                _ => 0.0,
            };
            let leg_cost = self.leg_cost(leg);
            let left_on_leg = (1.0 - progress) * leg_cost;

            if left_on_leg <= budget + BUDGET_EPSILON {
                budget = (budget - left_on_leg).max(0.0);
                position = GridPosition::Node { node: leg.to };
                legs_completed += 1;
                continue;
            }
            if budget > BUDGET_EPSILON {
                position = GridPosition::Edge {
                    leg: *leg,
                    progress: (progress + budget / leg_cost).min(1.0),
                };
            }
            break;
        }

        Advance {
            position,
            legs_completed,
            arrived: legs_completed == remaining.len(),
        }
    }
}
