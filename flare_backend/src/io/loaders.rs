use anyhow::{Context, Result};
use log::info;
use std::path::Path;

use crate::config::InputSettings;
use crate::core::domain::{RawFacility, RawObservation};
use crate::geometry::crs::Layer;
use crate::parsing::csv_parser;
use crate::parsing::geojson_parser;

/// Raw inputs of one pipeline run
#[derive(Debug, Clone)]
pub struct InputLoadResult {
    pub observations: Vec<RawObservation>,
    pub facilities: Layer<RawFacility>,
}

impl InputLoadResult {
    pub fn num_observations(&self) -> usize {
        self.observations.len()
    }

    pub fn num_facilities(&self) -> usize {
        self.facilities.len()
    }
}

/// Unified interface for loading the observation and facility files
pub struct FlareInputLoader;

impl FlareInputLoader {
    /// Load every input file named in the settings
    pub fn load(settings: &InputSettings) -> Result<InputLoadResult> {
        let observations = Self::load_observations(&settings.observations_csv)?;
        let facilities =
            Self::load_facilities(&settings.facility_points, &settings.facility_polygons)?;

        let inputs = InputLoadResult {
            observations,
            facilities,
        };
        info!(
            "Loaded {} observations and {} facilities",
            inputs.num_observations(),
            inputs.num_facilities()
        );
        Ok(inputs)
    }

    /// Load raw observations from a VNF CSV file
    pub fn load_observations(csv_path: &Path) -> Result<Vec<RawObservation>> {
        csv_parser::parse_observations_csv_to_records(csv_path)
            .context("Failed to load observation CSV")
    }

    /// Load point and polygon facilities into a single geographic layer
    pub fn load_facilities(points_path: &Path, polygons_path: &Path) -> Result<Layer<RawFacility>> {
        geojson_parser::load_facilities(points_path, polygons_path)
            .context("Failed to load facility GeoJSON")
    }
}
