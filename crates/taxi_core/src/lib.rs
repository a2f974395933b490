//! Autonomous taxi auction simulation on a city street grid.
//!
//! Taxis bid for ride requests in a sealed-bid auction run by a central
//! dispatcher once per tick, then drive their fares across a grid whose street
//! costs move with traffic. Start with [`runner::Simulation`].

pub mod auction;
pub mod bidding;
pub mod clock;
pub mod ecs;
pub mod error;
pub mod events;
pub mod fares;
pub mod grid;
pub mod pricing;
pub mod routing;
pub mod runner;
pub mod scenario;
pub mod systems;
pub mod telemetry;
pub mod traffic;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
