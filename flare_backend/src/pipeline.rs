//! End-to-end flare dataset build.
//!
//! Stages run in order: normalize, cluster, join, aggregate, summarize. Each
//! stage consumes the previous stage's output and never modifies it. A
//! failing stage stops the run with a [`PipelineError`] naming the stage and
//! the number of records skipped before it.

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::aggregation::aggregator::{aggregate_clusters, ClusterStatistics};
use crate::aggregation::summary::{cross_tabulate, scatter_sample, CrossTabRow, ScatterPoint};
use crate::clustering::builder::build_clusters;
use crate::config::PipelineConfig;
use crate::core::domain::{FacilitySource, RawFacility, RawObservation};
use crate::error::{FlareError, PipelineError, Stage};
use crate::geometry::crs::Layer;
use crate::geometry::normalizer::GeometryNormalizer;
use crate::io::loaders::FlareInputLoader;
use crate::join::spatial::spatial_join;

/// Record counts for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub observations_read: usize,
    pub observations_skipped: usize,
    pub facilities_read: usize,
    pub facilities_skipped: usize,
    pub facility_points: usize,
    pub facility_polygons: usize,
    pub cluster_count: usize,
    /// Clusters whose observation range reaches `min_observation_range_days`.
    pub clusters_meeting_min_range: usize,
}

impl RunReport {
    pub fn skipped_records(&self) -> usize {
        self.observations_skipped + self.facilities_skipped
    }
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// `(observation id, cluster index)` for every observation that passed
    /// normalization, in input order.
    pub assignments: Vec<(i64, usize)>,
    pub statistics: Vec<ClusterStatistics>,
    pub cross_tab: Vec<CrossTabRow>,
    pub scatter: Vec<ScatterPoint>,
    pub report: RunReport,
}

#[derive(Debug, Clone, Default)]
pub struct FlarePipeline {
    config: PipelineConfig,
}

impl FlarePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs every stage over in-memory inputs.
    ///
    /// Observations are geographic lon/lat records; facilities may come in
    /// any supported CRS and are reprojected with the observations.
    ///
    /// The configuration is validated first, so an unusable radius fails the
    /// run at the `configure` stage instead of being blamed on the records.
    pub fn run(
        &self,
        raw_observations: &[RawObservation],
        raw_facilities: &Layer<RawFacility>,
    ) -> Result<PipelineOutput, PipelineError> {
        let config = &self.config;
        config
            .validate()
            .map_err(|e| PipelineError::new(Stage::Configure, 0, e))?;

        let mut report = RunReport {
            observations_read: raw_observations.len(),
            facilities_read: raw_facilities.len(),
            facility_points: raw_facilities
                .iter()
                .filter(|f| f.source == FacilitySource::PointDerived)
                .count(),
            ..RunReport::default()
        };
        report.facility_polygons = report.facilities_read - report.facility_points;

        info!(
            "Starting flare pipeline: {} observations, {} facilities",
            report.observations_read, report.facilities_read
        );

        // Normalize
        let normalizer = GeometryNormalizer::from_config(config);
        let observations = normalizer
            .normalize_observations(raw_observations)
            .map_err(fail(Stage::Normalize, &report))?;
        report.observations_skipped = observations.skipped.len();

        let facilities = normalizer
            .normalize_facilities(raw_facilities, config.facilities.point_buffer_radius)
            .map_err(fail(Stage::Normalize, &report))?;
        report.facilities_skipped = facilities.skipped.len();

        let buffers = normalizer
            .buffer_observations(&observations.layer, config.clustering.buffer_radius)
            .map_err(fail(Stage::Normalize, &report))?;

        // Cluster
        let clusters = build_clusters(&buffers).map_err(fail(Stage::Cluster, &report))?;
        report.cluster_count = clusters.len();

        // Join
        let joined = spatial_join(&observations.layer, &clusters, &facilities.layer)
            .map_err(fail(Stage::Join, &report))?;

        // Aggregate
        let statistics = aggregate_clusters(
            &observations.layer,
            &joined.assignments,
            &clusters,
            &joined.facility_matches,
            &config.thresholds,
        )
        .map_err(fail(Stage::Aggregate, &report))?;

        report.clusters_meeting_min_range = statistics
            .iter()
            .filter(|s| s.observation_range_days >= config.thresholds.min_observation_range_days)
            .count();

        // Summarize
        let cross_tab = cross_tabulate(&statistics);
        let scatter = scatter_sample(&statistics);

        info!(
            "Flare pipeline complete: {} clusters, {} matched to facilities, {} records skipped",
            report.cluster_count,
            statistics.iter().filter(|s| s.facility_match).count(),
            report.skipped_records()
        );

        let assignments = observations
            .layer
            .iter()
            .zip(&joined.assignments)
            .map(|(obs, &cluster)| (obs.id, cluster))
            .collect();

        Ok(PipelineOutput {
            assignments,
            statistics,
            cross_tab,
            scatter,
            report,
        })
    }

    /// Loads the configured input files and runs the pipeline over them.
    ///
    /// A stage failure is returned as a [`PipelineError`] inside the
    /// `anyhow::Error`, so callers can downcast to find the stage.
    pub fn process_files(&self) -> Result<PipelineOutput> {
        let inputs = FlareInputLoader::load(&self.config.input)
            .context("Failed to load pipeline inputs")?;

        let output = self.run(&inputs.observations, &inputs.facilities)?;
        Ok(output)
    }
}

fn fail(stage: Stage, report: &RunReport) -> impl FnOnce(FlareError) -> PipelineError {
    let skipped = report.skipped_records();
    move |source| PipelineError::new(stage, skipped, source)
}
