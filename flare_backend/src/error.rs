//! Error types for the flare clustering pipeline.

use std::fmt;

use crate::geometry::crs::Crs;

/// Result type for pipeline operations
pub type FlareResult<T> = Result<T, FlareError>;

/// Error type for pipeline operations.
///
/// `ClusterAssignmentAmbiguous`, `UnassignedObservation` and `EmptyCluster`
/// mean the cluster partition is broken. They are never recovered from.
#[derive(Debug, thiserror::Error)]
pub enum FlareError {
    #[error("Invalid geometry for record {record}: {reason}")]
    InvalidGeometry { record: String, reason: String },

    #[error("Malformed record {record}: {reason}")]
    MalformedRecord { record: String, reason: String },

    #[error("CRS mismatch: expected EPSG:{} but found EPSG:{}", .expected.epsg(), .found.epsg())]
    CrsMismatch { expected: Crs, found: Crs },

    #[error("Observation {observation} falls inside {matches} cluster polygons")]
    ClusterAssignmentAmbiguous { observation: i64, matches: usize },

    #[error("Observation {observation} is not covered by any cluster polygon")]
    UnassignedObservation { observation: i64 },

    #[error("Join precondition failed: {0}")]
    JoinIndex(String),

    #[error("Cluster {cluster} has no observations assigned")]
    EmptyCluster { cluster: usize },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Table conversion error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

impl FlareError {
    pub fn invalid_geometry(record: impl Into<String>, reason: impl Into<String>) -> Self {
        FlareError::InvalidGeometry {
            record: record.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed_record(record: impl Into<String>, reason: impl Into<String>) -> Self {
        FlareError::MalformedRecord {
            record: record.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error concerns a single malformed input record, which the
    /// skip policy is allowed to drop.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            FlareError::InvalidGeometry { .. } | FlareError::MalformedRecord { .. }
        )
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configure,
    Normalize,
    Cluster,
    Join,
    Aggregate,
    Summarize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Configure => write!(f, "configure"),
            Stage::Normalize => write!(f, "normalize"),
            Stage::Cluster => write!(f, "cluster"),
            Stage::Join => write!(f, "join"),
            Stage::Aggregate => write!(f, "aggregate"),
            Stage::Summarize => write!(f, "summarize"),
        }
    }
}

/// A failed pipeline run: the stage that failed, the records skipped before
/// the failure and the underlying error.
#[derive(Debug, thiserror::Error)]
#[error("Pipeline failed at stage '{stage}' ({skipped_records} records skipped): {source}")]
pub struct PipelineError {
    pub stage: Stage,
    pub skipped_records: usize,
    #[source]
    pub source: FlareError,
}

impl PipelineError {
    pub fn new(stage: Stage, skipped_records: usize, source: FlareError) -> Self {
        Self {
            stage,
            skipped_records,
            source,
        }
    }
}
