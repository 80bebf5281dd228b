//! Reporting tables derived from cluster statistics.

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aggregation::aggregator::{threshold_column, ClusterStatistics};
use crate::error::FlareResult;

/// Cluster count for one (facility_match, temp_over_threshold) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossTabRow {
    pub facility_match: bool,
    pub temp_over_threshold: bool,
    pub cluster_count: usize,
}

/// One (observation_count, temp_mean) pair per cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub observation_count: usize,
    pub temp_mean: f64,
}

/// Counts clusters for every combination of facility match and temperature flag.
///
/// Always returns four rows ordered `(false, false)`, `(false, true)`,
/// `(true, false)`, `(true, true)`; empty combinations have a zero count.
pub fn cross_tabulate(statistics: &[ClusterStatistics]) -> Vec<CrossTabRow> {
    let mut counts = [0usize; 4];
    for s in statistics {
        counts[usize::from(s.facility_match) * 2 + usize::from(s.temp_over_threshold)] += 1;
    }

    counts
        .iter()
        .enumerate()
        .map(|(slot, &cluster_count)| CrossTabRow {
            facility_match: slot >= 2,
            temp_over_threshold: slot % 2 == 1,
            cluster_count,
        })
        .collect()
}

/// Projects every cluster to its (observation_count, temp_mean) pair, unfiltered.
pub fn scatter_sample(statistics: &[ClusterStatistics]) -> Vec<ScatterPoint> {
    statistics
        .iter()
        .map(|s| ScatterPoint {
            observation_count: s.observation_count,
            temp_mean: s.temp_mean,
        })
        .collect()
}

pub fn cross_tab_to_dataframe(
    rows: &[CrossTabRow],
    temperature_threshold: f64,
) -> FlareResult<DataFrame> {
    let df = df!(
        "facility_match" => rows.iter().map(|r| r.facility_match).collect::<Vec<_>>(),
        threshold_column(temperature_threshold) => rows
            .iter()
            .map(|r| r.temp_over_threshold)
            .collect::<Vec<_>>(),
        "observation_count" => rows.iter().map(|r| r.cluster_count as u64).collect::<Vec<_>>(),
    )?;
    Ok(df)
}

pub fn scatter_to_dataframe(points: &[ScatterPoint]) -> FlareResult<DataFrame> {
    let df = df!(
        "observation_count" => points
            .iter()
            .map(|p| p.observation_count as u64)
            .collect::<Vec<_>>(),
        "temp_bb_mean" => points.iter().map(|p| p.temp_mean).collect::<Vec<_>>(),
    )?;
    Ok(df)
}
