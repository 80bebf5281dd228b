//! Flare dataset build.
//!
//! Loads the VNF observation sample and the facility layers, runs the
//! clustering pipeline and writes the report datasets.
//!
//! # Usage
//!
//! ```bash
//! # Use ./flares.toml if present, built-in defaults otherwise
//! cargo run --bin build-flare-dataset
//!
//! # Explicit configuration file
//! cargo run --bin build-flare-dataset -- path/to/flares.toml
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::process::ExitCode;

use anyhow::Context;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use vnf_flares::io::DatasetWriter;
use vnf_flares::{FlarePipeline, PipelineConfig, PipelineError};

fn main() -> ExitCode {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .init();

    match build() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<PipelineError>() {
                Some(failure) => error!(
                    stage = %failure.stage,
                    skipped_records = failure.skipped_records,
                    "Dataset build failed: {}",
                    failure.source
                ),
                None => error!("Dataset build failed: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn build() -> anyhow::Result<()> {
    let config = match env::args().nth(1) {
        Some(path) => PipelineConfig::from_file(&path)
            .with_context(|| format!("Invalid configuration in {}", path))?,
        None => PipelineConfig::from_default_location().context("Invalid configuration")?,
    };

    info!("Starting dataset build");
    let pipeline = FlarePipeline::with_config(config);
    let output = pipeline.process_files()?;

    let config = pipeline.config();
    let writer = DatasetWriter::new(
        &config.output.directory,
        config.thresholds.temperature_threshold,
    );
    let written = writer.write_all(&output)?;

    info!(
        clusters = output.report.cluster_count,
        observations_skipped = output.report.observations_skipped,
        facilities_skipped = output.report.facilities_skipped,
        "Dataset build complete, cluster layer at {}",
        written.clusters.display()
    );
    Ok(())
}
