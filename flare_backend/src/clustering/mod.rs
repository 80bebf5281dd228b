//! Observation clustering.
//!
//! - [`builder`]: Merges touching or overlapping buffers into disjoint clusters

pub mod builder;

pub use builder::{build_clusters, buffers_touch, Cluster};
