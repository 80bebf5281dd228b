//! Gas flare detection from VIIRS Nightfire observations.
//!
//! Observations are buffered, merged into flare clusters, joined to known
//! oil and gas facilities and summarized per cluster. See [`pipeline`] for
//! the stage order and [`config`] for the tunable radii and thresholds.

pub mod aggregation;
pub mod clustering;
pub mod config;
pub mod core;
pub mod error;
pub mod geometry;
pub mod io;
pub mod join;
pub mod parsing;
pub mod pipeline;

pub use config::PipelineConfig;
pub use error::{FlareError, FlareResult, PipelineError, Stage};
pub use pipeline::{FlarePipeline, PipelineOutput, RunReport};
