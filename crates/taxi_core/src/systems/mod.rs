pub mod traffic_update;
pub mod fare_generation;
pub mod broadcast;
pub mod bid_collection;
pub mod resolution;
pub mod allocation_notice;
pub mod movement;
pub mod duty_roster;
pub mod settlement;
