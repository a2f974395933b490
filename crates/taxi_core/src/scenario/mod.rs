//! Scenario setup: configuration, the seeded random stream, and the world
//! builder that spawns taxis and installs every simulation resource.

mod build;
mod params;

use bevy_ecs::prelude::Resource;
use rand::rngs::StdRng;

pub use build::build_world;
pub use params::{DutyConfig, SimConfig};

/// The single random stream of a run, seeded from `SimConfig::random_seed`.
#[derive(Debug, Clone, Resource)]
pub struct SimRng(pub StdRng);
