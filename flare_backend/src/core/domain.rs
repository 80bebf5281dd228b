//! Domain models for VNF observations and oil and gas facilities.
//!
//! Raw records come straight from the loaders and may be incomplete. The
//! geometry normalizer turns them into [`Observation`]s and [`Facility`]s
//! whose geometries are valid and projected.

use chrono::NaiveDateTime;
use geo::{
    BoundingRect, EuclideanDistance, Geometry, Intersects, MultiPolygon, Point, Polygon, Rect,
};
use serde::{Deserialize, Serialize};

/// A VNF observation as delivered by the loader.
///
/// Every field except the identifier is optional: a missing value makes the
/// record malformed, and the normalizer decides whether to skip or abort.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawObservation {
    pub id: i64,
    pub lat_gmtco: Option<f64>,
    pub lon_gmtco: Option<f64>,
    pub date_mscan: Option<NaiveDateTime>,
    /// Source text of a scan time that could not be parsed.
    pub date_mscan_text: Option<String>,
    pub temp_bb: Option<f64>,
    pub radiant_heat_intensity: Option<f64>,
    pub radiant_heat: Option<f64>,
    pub area_bb: Option<f64>,
    pub sample_m10: Option<f64>,
}

/// A validated observation with its position projected into the working CRS.
///
/// Observations are never modified after normalization. Derived values such
/// as the assigned cluster are kept alongside, not written back.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub location: Point<f64>,
    pub scanned_at: NaiveDateTime,
    pub temp_bb: f64,
    pub radiant_heat_intensity: f64,
    pub radiant_heat: f64,
    pub area_bb: f64,
    pub sample_m10: f64,
}

/// Where a facility geometry originally came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FacilitySource {
    /// A point location, buffered into an area.
    PointDerived,
    /// A polygon outline from the source data.
    PolygonNative,
}

/// A facility record as delivered by the loader.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFacility {
    pub id: String,
    pub source: FacilitySource,
    pub geometry: Option<Geometry<f64>>,
}

/// Area geometry of a facility, in the working CRS.
#[derive(Debug, Clone, PartialEq)]
pub enum FacilityGeometry {
    BufferedPoint {
        origin: Point<f64>,
        radius: f64,
        area: Polygon<f64>,
    },
    NativePolygon(MultiPolygon<f64>),
}

impl FacilityGeometry {
    pub fn source(&self) -> FacilitySource {
        match self {
            FacilityGeometry::BufferedPoint { .. } => FacilitySource::PointDerived,
            FacilityGeometry::NativePolygon(_) => FacilitySource::PolygonNative,
        }
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            FacilityGeometry::BufferedPoint { origin, radius, .. } => Some(Rect::new(
                (origin.x() - radius, origin.y() - radius),
                (origin.x() + radius, origin.y() + radius),
            )),
            FacilityGeometry::NativePolygon(polygons) => polygons.bounding_rect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FacilityGeometry::BufferedPoint { area, .. } => area.exterior().0.is_empty(),
            FacilityGeometry::NativePolygon(polygons) => polygons.0.is_empty(),
        }
    }

    /// Whether the facility reaches a cluster outline; touching counts.
    ///
    /// Point facilities are tested on their exact circle. `tolerance` widens
    /// that test by the gap between the cluster's own circles and its
    /// polygon, so circles that touch always match.
    pub fn reaches(&self, cluster: &MultiPolygon<f64>, tolerance: f64) -> bool {
        match self {
            FacilityGeometry::BufferedPoint { origin, radius, .. } => {
                origin.euclidean_distance(cluster) <= radius + tolerance
            }
            FacilityGeometry::NativePolygon(polygons) => polygons.intersects(cluster),
        }
    }
}

/// A known oil and gas installation.
#[derive(Debug, Clone, PartialEq)]
pub struct Facility {
    pub id: String,
    pub geometry: FacilityGeometry,
}

impl Facility {
    pub fn source(&self) -> FacilitySource {
        self.geometry.source()
    }
}
