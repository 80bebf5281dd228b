//! Union-based clustering of observation buffers.
//!
//! Two buffers belong to the same cluster when their circles overlap or touch,
//! directly or through a chain of other buffers. Candidate pairs come from an
//! R-tree over the buffer envelopes, and the connected components are merged
//! with a disjoint-set forest. Each component's buffer polygons are then
//! unioned into the cluster geometry.
//!
//! Circles whose centers are exactly `r_a + r_b` apart touch and are merged.

use std::collections::{HashMap, HashSet};

use geo::{BooleanOps, MultiPolygon};
use log::{debug, info};
use rayon::prelude::*;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use crate::error::{FlareError, FlareResult};
use crate::geometry::buffer::inscribed_gap;
use crate::geometry::crs::Layer;
use crate::geometry::normalizer::BufferedObservation;

type IndexedEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// A maximal group of touching or overlapping observation buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Synthetic cluster index, equal to the cluster's position in its layer.
    pub index: usize,
    /// Union of the member buffers. May have several parts, since buffer
    /// polygons are inscribed in their circles.
    pub geometry: MultiPolygon<f64>,
    /// Number of buffers merged into the cluster.
    pub buffer_count: usize,
    /// Widest gap between the member circles and the polygon outline.
    pub boundary_gap: f64,
}

/// Builds clusters from buffered observations.
///
/// Cluster indices follow the position of each cluster's first buffer, so the
/// same input always yields the same partition and the same labels.
pub fn build_clusters(buffers: &Layer<BufferedObservation>) -> FlareResult<Layer<Cluster>> {
    buffers.ensure_projected()?;

    let items = buffers.items();
    for buffer in items {
        if !buffer.radius.is_finite() || buffer.radius <= 0.0 {
            return Err(FlareError::invalid_geometry(
                buffer.observation.to_string(),
                format!("buffer radius must be positive, got {}", buffer.radius),
            ));
        }
    }

    let components = connected_components(items);
    debug!(
        "Found {} connected components among {} buffers",
        components.len(),
        items.len()
    );

    let clusters: Vec<Cluster> = components
        .par_iter()
        .enumerate()
        .map(|(index, members)| Cluster {
            index,
            geometry: union_members(items, members),
            buffer_count: members.len(),
            boundary_gap: members
                .iter()
                .map(|&i| {
                    let segments = items[i].area.exterior().0.len().saturating_sub(1);
                    inscribed_gap(items[i].radius, segments)
                })
                .fold(0.0, f64::max),
        })
        .collect();

    info!(
        "Built {} clusters from {} observation buffers",
        clusters.len(),
        items.len()
    );
    Ok(Layer::new(buffers.crs(), clusters))
}

/// Whether two buffer circles overlap or touch.
pub fn buffers_touch(a: &BufferedObservation, b: &BufferedObservation) -> bool {
    let dx = a.center.x() - b.center.x();
    let dy = a.center.y() - b.center.y();
    let reach = a.radius + b.radius;
    dx * dx + dy * dy <= reach * reach
}

fn envelope(buffer: &BufferedObservation) -> AABB<[f64; 2]> {
    let (x, y, r) = (buffer.center.x(), buffer.center.y(), buffer.radius);
    AABB::from_corners([x - r, y - r], [x + r, y + r])
}

/// Groups buffer positions into connected components, ordered by their
/// smallest member.
fn connected_components(items: &[BufferedObservation]) -> Vec<Vec<usize>> {
    let tree: RTree<IndexedEnvelope> = RTree::bulk_load(
        items
            .iter()
            .enumerate()
            .map(|(i, b)| GeomWithData::new(Rectangle::from_aabb(envelope(b)), i))
            .collect(),
    );

    let mut sets = DisjointSet::new(items.len());
    for (i, buffer) in items.iter().enumerate() {
        for candidate in tree.locate_in_envelope_intersecting(&envelope(buffer)) {
            let j = candidate.data;
            if j > i && buffers_touch(buffer, &items[j]) {
                sets.union(i, j);
            }
        }
    }

    let mut slot_by_root: HashMap<usize, usize> = HashMap::new();
    let mut components: Vec<Vec<usize>> = Vec::new();
    for i in 0..items.len() {
        let root = sets.find(i);
        let slot = *slot_by_root.entry(root).or_insert_with(|| {
            components.push(Vec::new());
            components.len() - 1
        });
        components[slot].push(i);
    }

    components
}

/// Unions the buffer polygons of one component, pairwise in a balanced tree.
fn union_members(items: &[BufferedObservation], members: &[usize]) -> MultiPolygon<f64> {
    // Identical circles add nothing to the union
    let mut seen = HashSet::new();
    let mut parts: Vec<MultiPolygon<f64>> = members
        .iter()
        .map(|&i| &items[i])
        .filter(|b| {
            let key = (
                b.center.x().to_bits(),
                b.center.y().to_bits(),
                b.radius.to_bits(),
            );
            seen.insert(key)
        })
        .map(|b| MultiPolygon::new(vec![b.area.clone()]))
        .collect();

    while parts.len() > 1 {
        let mut merged = Vec::with_capacity(parts.len() / 2 + 1);
        let mut iter = parts.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => merged.push(a.union(&b)),
                None => merged.push(a),
            }
        }
        parts = merged;
    }

    parts.pop().unwrap_or_else(|| MultiPolygon::new(vec![]))
}

/// Disjoint-set forest with path halving and union by rank.
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}
