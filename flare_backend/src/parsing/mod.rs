//! Loaders for VNF observation and facility input files.
//!
//! # Parsers
//!
//! - [`csv_parser`]: Parse VNF observation CSV files
//! - [`geojson_parser`]: Parse point and polygon facility GeoJSON files
//!
//! # Example
//!
//! ```no_run
//! use vnf_flares::parsing::csv_parser::parse_observations_csv_to_records;
//! use std::path::Path;
//!
//! let observations = parse_observations_csv_to_records(Path::new("vnf_measurements.csv"))
//!     .expect("Failed to parse observations");
//! ```

pub mod csv_parser;
pub mod geojson_parser;

#[cfg(test)]
mod csv_parser_tests;

pub use csv_parser::{parse_observations_csv, parse_observations_csv_to_records, parse_timestamp};
pub use geojson_parser::{load_facilities, parse_facility_geojson};
