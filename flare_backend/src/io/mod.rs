//! Input loading and dataset export.
//!
//! # Example
//!
//! ```no_run
//! use vnf_flares::config::PipelineConfig;
//! use vnf_flares::io::loaders::FlareInputLoader;
//!
//! let config = PipelineConfig::default();
//! let inputs = FlareInputLoader::load(&config.input).expect("Failed to load");
//! println!("Loaded {} observations", inputs.num_observations());
//! ```

pub mod loaders;
pub mod writers;

pub use loaders::{FlareInputLoader, InputLoadResult};
pub use writers::{clusters_to_geojson, DatasetWriter, WrittenDataset};
