//! Dataset export.
//!
//! Writes the cluster layer as GeoJSON and the reporting tables as CSV into
//! an output directory, using the file names the report app reads.

use anyhow::{Context, Result};
use geo::{LineString, MultiPolygon};
use log::info;
use polars::prelude::*;
use serde_json::{json, Map, Value};
use std::fs::File;
use std::path::PathBuf;

use crate::aggregation::aggregator::{
    statistics_to_dataframe, threshold_column, ClusterStatistics, DATE_FORMAT,
};
use crate::aggregation::summary::{cross_tab_to_dataframe, scatter_to_dataframe};
use crate::geometry::crs::Crs;
use crate::pipeline::{PipelineOutput, RunReport};

pub const CLUSTERS_FILE: &str = "flare_clusters.geojson";
pub const CLUSTER_TABLE_FILE: &str = "flare_clusters.csv";
pub const FACILITY_SUMMARY_FILE: &str = "facility_match_summary.csv";
pub const SCATTER_FILE: &str = "flare_clusters_scatter_data.csv";
pub const RECORD_COUNTS_FILE: &str = "record_counts.csv";

/// Paths of the files written by [`DatasetWriter::write_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenDataset {
    pub clusters: PathBuf,
    pub cluster_table: PathBuf,
    pub facility_summary: PathBuf,
    pub scatter: PathBuf,
    pub record_counts: PathBuf,
}

pub struct DatasetWriter {
    directory: PathBuf,
    temperature_threshold: f64,
}

impl DatasetWriter {
    pub fn new(directory: impl Into<PathBuf>, temperature_threshold: f64) -> Self {
        Self {
            directory: directory.into(),
            temperature_threshold,
        }
    }

    /// Write every output file, creating the directory if needed
    pub fn write_all(&self, output: &PipelineOutput) -> Result<WrittenDataset> {
        std::fs::create_dir_all(&self.directory).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                self.directory.display()
            )
        })?;

        let written = WrittenDataset {
            clusters: self.write_cluster_geojson(&output.statistics)?,
            cluster_table: self.write_csv(
                CLUSTER_TABLE_FILE,
                statistics_to_dataframe(&output.statistics, self.temperature_threshold)?,
            )?,
            facility_summary: self.write_csv(
                FACILITY_SUMMARY_FILE,
                cross_tab_to_dataframe(&output.cross_tab, self.temperature_threshold)?,
            )?,
            scatter: self.write_csv(SCATTER_FILE, scatter_to_dataframe(&output.scatter)?)?,
            record_counts: self.write_csv(
                RECORD_COUNTS_FILE,
                record_counts_to_dataframe(&output.report)?,
            )?,
        };

        info!(
            "Wrote {} clusters and summary tables to {}",
            output.statistics.len(),
            self.directory.display()
        );
        Ok(written)
    }

    /// Write the cluster layer with its statistics as feature properties
    pub fn write_cluster_geojson(&self, statistics: &[ClusterStatistics]) -> Result<PathBuf> {
        let path = self.directory.join(CLUSTERS_FILE);
        let collection =
            clusters_to_geojson(statistics, self.temperature_threshold, Crs::WebMercator);

        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer(std::io::BufWriter::new(file), &collection)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(path)
    }

    fn write_csv(&self, name: &str, mut df: DataFrame) -> Result<PathBuf> {
        let path = self.directory.join(name);
        let mut file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(path)
    }
}

/// Record counts as a two-column (dataset, records) table
pub fn record_counts_to_dataframe(report: &RunReport) -> Result<DataFrame> {
    let rows: [(&str, usize); 8] = [
        ("vnf_observations", report.observations_read),
        ("vnf_observations_skipped", report.observations_skipped),
        ("facility_points", report.facility_points),
        ("facility_polygons", report.facility_polygons),
        ("facilities_skipped", report.facilities_skipped),
        ("facilities_total", report.facilities_read),
        ("flare_clusters", report.cluster_count),
        ("flare_clusters_min_range", report.clusters_meeting_min_range),
    ];

    let df = df!(
        "dataset" => rows.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
        "records" => rows.iter().map(|(_, count)| *count as u64).collect::<Vec<_>>(),
    )?;
    Ok(df)
}

/// Build a GeoJSON FeatureCollection of clusters
pub fn clusters_to_geojson(
    statistics: &[ClusterStatistics],
    temperature_threshold: f64,
    crs: Crs,
) -> Value {
    let threshold_key = threshold_column(temperature_threshold);

    let features: Vec<Value> = statistics
        .iter()
        .map(|s| {
            let mut properties = Map::new();
            properties.insert("index".into(), json!(s.cluster_index));
            properties.insert("observation_count".into(), json!(s.observation_count));
            let date = |at: &chrono::NaiveDateTime| json!(at.format(DATE_FORMAT).to_string());
            properties.insert("date_mscan_min".into(), date(&s.date_min));
            properties.insert("date_mscan_max".into(), date(&s.date_max));
            properties.insert("temp_bb_mean".into(), json!(s.temp_mean));
            properties.insert("temp_bb_median".into(), json!(s.temp_median));
            properties.insert("temp_bb_max".into(), json!(s.temp_max));
            properties.insert(threshold_key.clone(), json!(s.temp_over_threshold));
            properties.insert("observation_range_days".into(), json!(s.observation_range_days));
            properties.insert("facility_overlaps".into(), json!(s.facility_overlap_count));
            properties.insert("facility_match".into(), json!(s.facility_match));

            json!({
                "type": "Feature",
                "id": s.cluster_index,
                "properties": properties,
                "geometry": multipolygon_geometry(&s.geometry),
            })
        })
        .collect();

    json!({
        "type": "FeatureCollection",
        "crs": {
            "type": "name",
            "properties": { "name": crs.urn() }
        },
        "features": features,
    })
}

fn multipolygon_geometry(geometry: &MultiPolygon<f64>) -> Value {
    let ring = |line: &LineString<f64>| -> Vec<[f64; 2]> {
        line.coords().map(|c| [c.x, c.y]).collect()
    };

    let polygons: Vec<Vec<Vec<[f64; 2]>>> = geometry
        .iter()
        .map(|polygon| {
            std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .map(ring)
                .collect()
        })
        .collect();

    json!({
        "type": "MultiPolygon",
        "coordinates": polygons,
    })
}
