//! Pipeline configuration file support.
//!
//! Settings are read from a TOML file (`flares.toml` by default). Every
//! section is optional and falls back to the defaults used for the VNF
//! analysis: 500 m buffers and a 1450 K temperature threshold.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{FlareError, FlareResult};
use crate::geometry::buffer::MIN_CIRCLE_SEGMENTS;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "flares.toml";

/// What to do with an input record whose geometry is missing or malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidRecordPolicy {
    /// Stop the run at the first malformed record.
    #[default]
    Abort,
    /// Drop the record, count it and report it at the end of the run.
    Skip,
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub clustering: ClusteringSettings,
    #[serde(default)]
    pub facilities: FacilitySettings,
    #[serde(default)]
    pub thresholds: ThresholdSettings,
    #[serde(default)]
    pub ingest: IngestSettings,
    #[serde(default)]
    pub input: InputSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

/// Observation buffering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringSettings {
    /// Buffer radius around each observation, in projected units (meters).
    #[serde(default = "default_buffer_radius")]
    pub buffer_radius: f64,
    /// Number of polygon segments used to approximate a buffer circle.
    #[serde(default = "default_circle_segments")]
    pub circle_segments: usize,
}

/// Facility normalization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilitySettings {
    /// Buffer radius applied to point facilities.
    #[serde(default = "default_buffer_radius")]
    pub point_buffer_radius: f64,
}

/// Classification thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSettings {
    /// Mean brightness temperature above which a cluster counts as hot.
    #[serde(default = "default_temperature_threshold")]
    pub temperature_threshold: f64,
    /// Observation span reported in the run summary. Never filters clusters.
    #[serde(default = "default_min_observation_range_days")]
    pub min_observation_range_days: i64,
}

/// Input record handling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestSettings {
    #[serde(default)]
    pub invalid_records: InvalidRecordPolicy,
}

/// Input file locations used by the dataset builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSettings {
    #[serde(default = "default_observations_csv")]
    pub observations_csv: PathBuf,
    #[serde(default = "default_facility_points")]
    pub facility_points: PathBuf,
    #[serde(default = "default_facility_polygons")]
    pub facility_polygons: PathBuf,
}

/// Output directory used by the dataset builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
}

fn default_buffer_radius() -> f64 {
    500.0
}

fn default_circle_segments() -> usize {
    64
}

fn default_temperature_threshold() -> f64 {
    1450.0
}

fn default_min_observation_range_days() -> i64 {
    1
}

fn default_observations_csv() -> PathBuf {
    PathBuf::from("data/vnf_measurements_5pc_sample.csv")
}

fn default_facility_points() -> PathBuf {
    PathBuf::from("data/osm_oil_and_gas_points.geojson")
}

fn default_facility_polygons() -> PathBuf {
    PathBuf::from("data/osm_oil_and_gas_polygons.geojson")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for ClusteringSettings {
    fn default() -> Self {
        Self {
            buffer_radius: default_buffer_radius(),
            circle_segments: default_circle_segments(),
        }
    }
}

impl Default for FacilitySettings {
    fn default() -> Self {
        Self {
            point_buffer_radius: default_buffer_radius(),
        }
    }
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        Self {
            temperature_threshold: default_temperature_threshold(),
            min_observation_range_days: default_min_observation_range_days(),
        }
    }
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            observations_csv: default_observations_csv(),
            facility_points: default_facility_points(),
            facility_polygons: default_facility_polygons(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(PipelineConfig)` if the file parses and its values are usable
    /// * `Err(FlareError::Configuration)` otherwise
    pub fn from_file<P: AsRef<Path>>(path: P) -> FlareResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            FlareError::Configuration(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> FlareResult<Self> {
        let config: PipelineConfig = toml::from_str(content).map_err(|e| {
            FlareError::Configuration(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load `flares.toml` from the current directory, or the defaults if the
    /// file does not exist.
    pub fn from_default_location() -> FlareResult<Self> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> FlareResult<()> {
        check_radius("clustering.buffer_radius", self.clustering.buffer_radius)?;
        check_radius(
            "facilities.point_buffer_radius",
            self.facilities.point_buffer_radius,
        )?;

        if self.clustering.circle_segments < MIN_CIRCLE_SEGMENTS {
            return Err(FlareError::Configuration(format!(
                "clustering.circle_segments must be at least {}, got {}",
                MIN_CIRCLE_SEGMENTS, self.clustering.circle_segments
            )));
        }

        if !self.thresholds.temperature_threshold.is_finite() {
            return Err(FlareError::Configuration(
                "thresholds.temperature_threshold must be finite".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_radius(name: &str, value: f64) -> FlareResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FlareError::Configuration(format!(
            "{} must be a positive number, got {}",
            name, value
        )))
    }
}
