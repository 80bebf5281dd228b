//! Geometry normalization: validation, reprojection and buffering.
//!
//! Raw observation and facility records are checked, projected into the
//! working CRS and, for points, buffered into area geometries. Malformed
//! records either abort normalization or are skipped and reported, depending
//! on the configured [`InvalidRecordPolicy`].

use geo::{Geometry, MultiPolygon, Point, Polygon};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::{InvalidRecordPolicy, PipelineConfig};
use crate::core::domain::{
    Facility, FacilityGeometry, FacilitySource, Observation, RawFacility, RawObservation,
};
use crate::error::{FlareError, FlareResult};
use crate::geometry::buffer::buffer_point;
use crate::geometry::crs::{project_lon_lat, reproject, Crs, Layer};

/// Number of skipped records logged individually before only the total is reported.
const SKIP_LOG_LIMIT: usize = 5;

/// A record dropped under the skip policy.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    pub id: String,
    pub reason: String,
}

/// Output of a normalization pass.
#[derive(Debug, Clone)]
pub struct Normalized<T> {
    pub layer: Layer<T>,
    pub skipped: Vec<SkippedRecord>,
}

/// A buffer circle around one observation.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedObservation {
    /// Position of the observation in its layer.
    pub observation: usize,
    pub center: Point<f64>,
    pub radius: f64,
    pub area: Polygon<f64>,
}

/// Validates, reprojects and buffers input geometries into one target CRS.
#[derive(Debug, Clone)]
pub struct GeometryNormalizer {
    target: Crs,
    policy: InvalidRecordPolicy,
    circle_segments: usize,
}

impl GeometryNormalizer {
    pub fn new(target: Crs, policy: InvalidRecordPolicy, circle_segments: usize) -> Self {
        Self {
            target,
            policy,
            circle_segments,
        }
    }

    /// Normalizer into Web Mercator using the configured policy and resolution.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            Crs::WebMercator,
            config.ingest.invalid_records,
            config.clustering.circle_segments,
        )
    }

    /// Validates raw observations and projects their lon/lat positions.
    ///
    /// Raw positions are geographic degrees (EPSG:4326).
    pub fn normalize_observations(
        &self,
        raw: &[RawObservation],
    ) -> FlareResult<Normalized<Observation>> {
        let results: Vec<(String, FlareResult<Observation>)> = raw
            .par_iter()
            .map(|record| (record.id.to_string(), self.normalize_observation(record)))
            .collect();

        let (items, skipped) = self.apply_policy("observation", results)?;
        info!(
            "Normalized {} observations into EPSG:{} ({} skipped)",
            items.len(),
            self.target.epsg(),
            skipped.len()
        );

        Ok(Normalized {
            layer: Layer::new(self.target, items),
            skipped,
        })
    }

    /// Unifies point and polygon facilities into area geometries in the
    /// target CRS. Point facilities are buffered by `point_buffer_radius`.
    pub fn normalize_facilities(
        &self,
        raw: &Layer<RawFacility>,
        point_buffer_radius: f64,
    ) -> FlareResult<Normalized<Facility>> {
        let source_crs = raw.crs();
        let results: Vec<(String, FlareResult<Facility>)> = raw
            .items()
            .par_iter()
            .map(|record| {
                (
                    record.id.clone(),
                    self.normalize_facility(record, source_crs, point_buffer_radius),
                )
            })
            .collect();

        let (items, skipped) = self.apply_policy("facility", results)?;
        let points = items
            .iter()
            .filter(|f| f.source() == FacilitySource::PointDerived)
            .count();
        info!(
            "Normalized {} facilities ({} point-derived, {} polygon-native, {} skipped)",
            items.len(),
            points,
            items.len() - points,
            skipped.len()
        );

        Ok(Normalized {
            layer: Layer::new(self.target, items),
            skipped,
        })
    }

    /// Buffers every observation into a circle of `radius`.
    ///
    /// Buffering needs planar units, so the layer must be projected.
    pub fn buffer_observations(
        &self,
        observations: &Layer<Observation>,
        radius: f64,
    ) -> FlareResult<Layer<BufferedObservation>> {
        observations.ensure_projected()?;

        let buffers = observations
            .items()
            .par_iter()
            .enumerate()
            .map(|(index, obs)| {
                buffer_point(obs.location, radius, self.circle_segments)
                    .map(|area| BufferedObservation {
                        observation: index,
                        center: obs.location,
                        radius,
                        area,
                    })
                    .map_err(|reason| FlareError::invalid_geometry(obs.id.to_string(), reason))
            })
            .collect::<FlareResult<Vec<_>>>()?;

        debug!("Buffered {} observations at radius {}", buffers.len(), radius);
        Ok(Layer::new(observations.crs(), buffers))
    }

    fn normalize_observation(&self, raw: &RawObservation) -> FlareResult<Observation> {
        let record = raw.id.to_string();

        let (lon, lat) = match (raw.lon_gmtco, raw.lat_gmtco) {
            (Some(lon), Some(lat)) => (lon, lat),
            _ => return Err(FlareError::invalid_geometry(record, "missing position")),
        };
        let location = project_lon_lat(lon, lat, self.target)
            .map_err(|reason| FlareError::invalid_geometry(&record, reason))?;

        let scanned_at = match (raw.date_mscan, &raw.date_mscan_text) {
            (Some(at), _) => at,
            (None, Some(text)) => {
                return Err(FlareError::malformed_record(
                    &record,
                    format!("unparseable date_mscan '{}'", text),
                ))
            }
            (None, None) => {
                return Err(FlareError::malformed_record(&record, "missing date_mscan"))
            }
        };

        Ok(Observation {
            id: raw.id,
            lat,
            lon,
            location,
            scanned_at,
            temp_bb: required(&record, "temp_bb", raw.temp_bb)?,
            radiant_heat_intensity: required(
                &record,
                "radiant_heat_intensity",
                raw.radiant_heat_intensity,
            )?,
            radiant_heat: required(&record, "radiant_heat", raw.radiant_heat)?,
            area_bb: required(&record, "area_bb", raw.area_bb)?,
            sample_m10: required(&record, "sample_m10", raw.sample_m10)?,
        })
    }

    fn normalize_facility(
        &self,
        raw: &RawFacility,
        source_crs: Crs,
        point_buffer_radius: f64,
    ) -> FlareResult<Facility> {
        let invalid = |reason: String| FlareError::invalid_geometry(&raw.id, reason);

        let geometry = raw
            .geometry
            .as_ref()
            .ok_or_else(|| invalid("null geometry".to_string()))?;

        let geometry = match (raw.source, geometry) {
            (FacilitySource::PointDerived, Geometry::Point(point)) => {
                let origin = reproject(point, source_crs, self.target).map_err(invalid)?;
                let area = buffer_point(origin, point_buffer_radius, self.circle_segments)
                    .map_err(invalid)?;
                FacilityGeometry::BufferedPoint {
                    origin,
                    radius: point_buffer_radius,
                    area,
                }
            }
            (FacilitySource::PolygonNative, Geometry::Polygon(polygon)) => {
                check_polygon(polygon).map_err(invalid)?;
                let projected = reproject(polygon, source_crs, self.target).map_err(invalid)?;
                FacilityGeometry::NativePolygon(MultiPolygon::new(vec![projected]))
            }
            (FacilitySource::PolygonNative, Geometry::MultiPolygon(polygons)) => {
                if polygons.0.is_empty() {
                    return Err(invalid("empty multipolygon".to_string()));
                }
                for polygon in &polygons.0 {
                    check_polygon(polygon).map_err(invalid)?;
                }
                let projected = reproject(polygons, source_crs, self.target).map_err(invalid)?;
                FacilityGeometry::NativePolygon(projected)
            }
            (source, other) => {
                return Err(invalid(format!(
                    "{:?} facility cannot use a {} geometry",
                    source,
                    geometry_kind(other)
                )))
            }
        };

        Ok(Facility {
            id: raw.id.clone(),
            geometry,
        })
    }

    fn apply_policy<T>(
        &self,
        kind: &str,
        results: Vec<(String, FlareResult<T>)>,
    ) -> FlareResult<(Vec<T>, Vec<SkippedRecord>)> {
        let mut items = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();

        for (id, result) in results {
            match result {
                Ok(item) => items.push(item),
                Err(err) if err.is_record_level() && self.policy == InvalidRecordPolicy::Skip => {
                    if skipped.len() < SKIP_LOG_LIMIT {
                        warn!("Skipping {} {}: {}", kind, id, err);
                    }
                    skipped.push(SkippedRecord {
                        id,
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        if skipped.len() > SKIP_LOG_LIMIT {
            warn!(
                "Total skipped {} records: {} (showing first {})",
                kind,
                skipped.len(),
                SKIP_LOG_LIMIT
            );
        }

        Ok((items, skipped))
    }
}

fn required(record: &str, field: &str, value: Option<f64>) -> FlareResult<f64> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(FlareError::malformed_record(
            record,
            format!("{} is not finite: {}", field, v),
        )),
        None => Err(FlareError::malformed_record(record, format!("missing {}", field))),
    }
}

fn check_polygon(polygon: &Polygon<f64>) -> Result<(), String> {
    if polygon.exterior().0.len() < 4 {
        return Err("polygon exterior needs at least 4 coordinates".to_string());
    }
    if !polygon.exterior().is_closed() {
        return Err("polygon exterior is not closed".to_string());
    }
    Ok(())
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
