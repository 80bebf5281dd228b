//! Spatial joins between observations, clusters and facilities.
//!
//! Both joins are left joins: every observation and every cluster appears in
//! the output, and candidates are pre-filtered through an R-tree of bounding
//! boxes before the exact geometric test.

use std::collections::BTreeSet;

use geo::{BoundingRect, Intersects, Rect};
use log::{debug, info};
use rayon::prelude::*;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use crate::clustering::builder::Cluster;
use crate::core::domain::{Facility, Observation};
use crate::error::{FlareError, FlareResult};
use crate::geometry::crs::Layer;

type IndexedBox = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Facilities intersecting one cluster.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FacilityMatch {
    /// Position of the cluster in its layer.
    pub cluster: usize,
    /// Identifiers of the distinct intersecting facilities, in layer order.
    pub facility_ids: Vec<String>,
}

impl FacilityMatch {
    pub fn overlap_count(&self) -> usize {
        self.facility_ids.len()
    }
}

/// Output of both joins.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinResult {
    /// Cluster position for every observation, in observation order.
    pub assignments: Vec<usize>,
    /// Facility matches for every cluster, in cluster order.
    pub facility_matches: Vec<FacilityMatch>,
}

/// Runs the observation→cluster and cluster→facility joins concurrently.
pub fn spatial_join(
    observations: &Layer<Observation>,
    clusters: &Layer<Cluster>,
    facilities: &Layer<Facility>,
) -> FlareResult<JoinResult> {
    let (assignments, facility_matches) = rayon::join(
        || assign_observations(observations, clusters),
        || match_facilities(clusters, facilities),
    );

    Ok(JoinResult {
        assignments: assignments?,
        facility_matches: facility_matches?,
    })
}

/// Finds the cluster polygon covering each observation.
///
/// # Errors
///
/// * `CrsMismatch` if the layers use different CRSs
/// * `JoinIndex` if there are observations but no clusters, or a cluster has
///   no geometry
/// * `UnassignedObservation` if no cluster covers an observation
/// * `ClusterAssignmentAmbiguous` if more than one cluster covers it
pub fn assign_observations(
    observations: &Layer<Observation>,
    clusters: &Layer<Cluster>,
) -> FlareResult<Vec<usize>> {
    clusters.ensure_same_crs(observations)?;

    if observations.is_empty() {
        return Ok(Vec::new());
    }
    if clusters.is_empty() {
        return Err(FlareError::JoinIndex(format!(
            "{} observations to assign but the cluster layer is empty",
            observations.len()
        )));
    }

    let tree = cluster_index(clusters)?;
    let assignments = observations
        .items()
        .par_iter()
        .map(|obs| {
            let point = [obs.location.x(), obs.location.y()];
            let matches: Vec<usize> = tree
                .locate_all_at_point(&point)
                .map(|candidate| candidate.data)
                .filter(|&c| clusters.items()[c].geometry.intersects(&obs.location))
                .collect();

            match matches.as_slice() {
                [cluster] => Ok(*cluster),
                [] => Err(FlareError::UnassignedObservation { observation: obs.id }),
                many => Err(FlareError::ClusterAssignmentAmbiguous {
                    observation: obs.id,
                    matches: many.len(),
                }),
            }
        })
        .collect::<FlareResult<Vec<usize>>>()?;

    debug!(
        "Assigned {} observations to {} clusters",
        assignments.len(),
        clusters.len()
    );
    Ok(assignments)
}

/// Collects the facilities whose geometry intersects each cluster.
///
/// Partial overlap counts as a match. Point facilities are compared on their
/// circle, allowing for the cluster's [`Cluster::boundary_gap`]. An empty
/// facility layer is a valid degenerate join and leaves every cluster unmatched.
pub fn match_facilities(
    clusters: &Layer<Cluster>,
    facilities: &Layer<Facility>,
) -> FlareResult<Vec<FacilityMatch>> {
    clusters.ensure_same_crs(facilities)?;

    let cluster_boxes = clusters
        .iter()
        .map(|c| {
            c.geometry.bounding_rect().ok_or_else(|| {
                FlareError::JoinIndex(format!("cluster {} has an empty geometry", c.index))
            })
        })
        .collect::<FlareResult<Vec<Rect<f64>>>>()?;

    if facilities.is_empty() {
        return Ok((0..clusters.len())
            .map(|cluster| FacilityMatch {
                cluster,
                facility_ids: Vec::new(),
            })
            .collect());
    }

    let tree: RTree<IndexedBox> = RTree::bulk_load(
        facilities
            .iter()
            .enumerate()
            .map(|(i, f)| {
                f.geometry
                    .bounding_rect()
                    .filter(|_| !f.geometry.is_empty())
                    .map(|rect| GeomWithData::new(rectangle(rect), i))
                    .ok_or_else(|| {
                        FlareError::JoinIndex(format!("facility {} has an empty geometry", f.id))
                    })
            })
            .collect::<FlareResult<Vec<_>>>()?,
    );

    let matches: Vec<FacilityMatch> = clusters
        .items()
        .par_iter()
        .zip(cluster_boxes.par_iter())
        .enumerate()
        .map(|(position, (cluster, rect))| {
            let gap = cluster.boundary_gap;
            let envelope = AABB::from_corners(
                [rect.min().x - gap, rect.min().y - gap],
                [rect.max().x + gap, rect.max().y + gap],
            );
            let hits: BTreeSet<usize> = tree
                .locate_in_envelope_intersecting(&envelope)
                .map(|candidate| candidate.data)
                .filter(|&f| facilities.items()[f].geometry.reaches(&cluster.geometry, gap))
                .collect();

            FacilityMatch {
                cluster: position,
                facility_ids: hits
                    .into_iter()
                    .map(|f| facilities.items()[f].id.clone())
                    .collect(),
            }
        })
        .collect();

    let matched = matches.iter().filter(|m| m.overlap_count() > 0).count();
    info!(
        "{} of {} clusters intersect at least one of {} facilities",
        matched,
        clusters.len(),
        facilities.len()
    );
    Ok(matches)
}

fn aabb(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

fn rectangle(rect: Rect<f64>) -> Rectangle<[f64; 2]> {
    Rectangle::from_aabb(aabb(rect))
}

fn cluster_index(clusters: &Layer<Cluster>) -> FlareResult<RTree<IndexedBox>> {
    let boxes = clusters
        .iter()
        .enumerate()
        .map(|(position, c)| {
            c.geometry
                .bounding_rect()
                .map(|rect| GeomWithData::new(rectangle(rect), position))
                .ok_or_else(|| {
                    FlareError::JoinIndex(format!("cluster {} has an empty geometry", c.index))
                })
        })
        .collect::<FlareResult<Vec<_>>>()?;

    Ok(RTree::bulk_load(boxes))
}
