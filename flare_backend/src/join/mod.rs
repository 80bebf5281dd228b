//! Spatial joins.
//!
//! - [`spatial`]: Observation to cluster assignment and cluster to facility matching

pub mod spatial;

pub use spatial::{assign_observations, match_facilities, spatial_join, FacilityMatch, JoinResult};
