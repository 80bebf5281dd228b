//! Per-cluster statistics.
//!
//! Observations are grouped by their assigned cluster and each group is folded
//! into one [`ClusterStatistics`] row: counts, the scan date span, brightness
//! temperature statistics, the facility overlap count and the two derived
//! classification flags.

use chrono::NaiveDateTime;
use geo::MultiPolygon;
use log::info;
use polars::prelude::*;
use rayon::prelude::*;

use crate::clustering::builder::Cluster;
use crate::config::ThresholdSettings;
use crate::core::domain::Observation;
use crate::error::{FlareError, FlareResult};
use crate::geometry::crs::Layer;
use crate::join::spatial::FacilityMatch;

/// Timestamp format used in exported tables.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Summary statistics for one cluster.
///
/// # Fields
///
/// * `observation_range_days` - Whole days between the first and last scan,
///   plus one. A single-scan cluster spans one day.
/// * `temp_over_threshold` - Mean brightness temperature above the configured
///   threshold (1450 K by default)
/// * `facility_overlap_count` - Distinct facilities intersecting the cluster
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterStatistics {
    pub cluster_index: usize,
    pub geometry: MultiPolygon<f64>,
    pub observation_count: usize,
    pub date_min: NaiveDateTime,
    pub date_max: NaiveDateTime,
    pub observation_range_days: i64,
    pub temp_mean: f64,
    pub temp_median: f64,
    pub temp_max: f64,
    pub temp_over_threshold: bool,
    pub facility_overlap_count: usize,
    pub facility_match: bool,
}

/// Groups observations by cluster and computes one statistics row per cluster.
///
/// # Arguments
/// * `observations` - Normalized observations
/// * `assignments` - Cluster position of each observation, from the spatial join
/// * `clusters` - Cluster layer the assignments refer to
/// * `facility_matches` - Facility matches per cluster; clusters without an
///   entry count as unmatched
/// * `thresholds` - Classification thresholds
///
/// # Errors
/// * `JoinIndex` if the assignments do not line up with the layers
/// * `EmptyCluster` if a cluster received no observations
pub fn aggregate_clusters(
    observations: &Layer<Observation>,
    assignments: &[usize],
    clusters: &Layer<Cluster>,
    facility_matches: &[FacilityMatch],
    thresholds: &ThresholdSettings,
) -> FlareResult<Vec<ClusterStatistics>> {
    if assignments.len() != observations.len() {
        return Err(FlareError::JoinIndex(format!(
            "{} assignments for {} observations",
            assignments.len(),
            observations.len()
        )));
    }

    let mut groups: Vec<Vec<&Observation>> = vec![Vec::new(); clusters.len()];
    for (obs, &cluster) in observations.iter().zip(assignments) {
        groups
            .get_mut(cluster)
            .ok_or_else(|| {
                FlareError::JoinIndex(format!(
                    "observation {} assigned to unknown cluster {}",
                    obs.id, cluster
                ))
            })?
            .push(obs);
    }

    let mut overlaps = vec![0usize; clusters.len()];
    for m in facility_matches {
        let slot = overlaps.get_mut(m.cluster).ok_or_else(|| {
            FlareError::JoinIndex(format!("facility match for unknown cluster {}", m.cluster))
        })?;
        *slot = m.overlap_count();
    }

    let statistics = clusters
        .items()
        .par_iter()
        .zip(groups.par_iter())
        .zip(overlaps.par_iter())
        .map(|((cluster, members), &overlap)| summarize(cluster, members, overlap, thresholds))
        .collect::<FlareResult<Vec<_>>>()?;

    let hot = statistics.iter().filter(|s| s.temp_over_threshold).count();
    info!(
        "Aggregated {} observations into {} cluster rows ({} above {} K)",
        observations.len(),
        statistics.len(),
        hot,
        thresholds.temperature_threshold
    );
    Ok(statistics)
}

fn summarize(
    cluster: &Cluster,
    members: &[&Observation],
    facility_overlap_count: usize,
    thresholds: &ThresholdSettings,
) -> FlareResult<ClusterStatistics> {
    let first = members.first().ok_or(FlareError::EmptyCluster {
        cluster: cluster.index,
    })?;

    let (date_min, date_max, temp_sum, temp_max) = members.iter().fold(
        (first.scanned_at, first.scanned_at, 0.0, f64::NEG_INFINITY),
        |(lo, hi, sum, max), obs| {
            (
                lo.min(obs.scanned_at),
                hi.max(obs.scanned_at),
                sum + obs.temp_bb,
                max.max(obs.temp_bb),
            )
        },
    );

    let observation_count = members.len();
    let temp_mean = temp_sum / observation_count as f64;
    let temp_median = median(members.iter().map(|obs| obs.temp_bb).collect());

    Ok(ClusterStatistics {
        cluster_index: cluster.index,
        geometry: cluster.geometry.clone(),
        observation_count,
        date_min,
        date_max,
        observation_range_days: (date_max - date_min).num_days() + 1,
        temp_mean,
        temp_median,
        temp_max,
        temp_over_threshold: temp_mean > thresholds.temperature_threshold,
        facility_overlap_count,
        facility_match: facility_overlap_count > 0,
    })
}

/// Median of a non-empty sample; the mean of the two middle values for even sizes.
fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Name of the temperature flag column for a threshold, e.g. `temp_over_1450`.
pub fn threshold_column(temperature_threshold: f64) -> String {
    format!("temp_over_{}", temperature_threshold)
}

/// Converts cluster statistics into a table, one row per cluster.
pub fn statistics_to_dataframe(
    statistics: &[ClusterStatistics],
    temperature_threshold: f64,
) -> FlareResult<DataFrame> {
    let df = df!(
        "cluster_index" => statistics.iter().map(|s| s.cluster_index as u64).collect::<Vec<_>>(),
        "observation_count" => statistics
            .iter()
            .map(|s| s.observation_count as u64)
            .collect::<Vec<_>>(),
        "date_mscan_min" => statistics
            .iter()
            .map(|s| s.date_min.format(DATE_FORMAT).to_string())
            .collect::<Vec<_>>(),
        "date_mscan_max" => statistics
            .iter()
            .map(|s| s.date_max.format(DATE_FORMAT).to_string())
            .collect::<Vec<_>>(),
        "observation_range_days" => statistics
            .iter()
            .map(|s| s.observation_range_days)
            .collect::<Vec<_>>(),
        "temp_bb_mean" => statistics.iter().map(|s| s.temp_mean).collect::<Vec<_>>(),
        "temp_bb_median" => statistics.iter().map(|s| s.temp_median).collect::<Vec<_>>(),
        "temp_bb_max" => statistics.iter().map(|s| s.temp_max).collect::<Vec<_>>(),
        threshold_column(temperature_threshold) => statistics
            .iter()
            .map(|s| s.temp_over_threshold)
            .collect::<Vec<_>>(),
        "facility_overlaps" => statistics
            .iter()
            .map(|s| s.facility_overlap_count as u64)
            .collect::<Vec<_>>(),
        "facility_match" => statistics.iter().map(|s| s.facility_match).collect::<Vec<_>>(),
    )?;
    Ok(df)
}
