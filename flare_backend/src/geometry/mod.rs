//! Geometry normalization.
//!
//! # Components
//!
//! - [`crs`]: CRS tags, CRS-tagged layers and the geographic to Web Mercator projection
//! - [`buffer`]: Circular buffers around points
//! - [`normalizer`]: Record validation, reprojection and buffering with a skip/abort policy

pub mod buffer;
pub mod crs;
pub mod normalizer;

pub use buffer::buffer_point;
pub use crs::{Crs, Layer};
pub use normalizer::{BufferedObservation, GeometryNormalizer, Normalized, SkippedRecord};
