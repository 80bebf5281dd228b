//! GeoJSON facility layers.
//!
//! Only the subset of RFC 7946 needed for facility outlines is read: a
//! `FeatureCollection` whose features carry Point, Polygon or MultiPolygon
//! geometries. Any other geometry type is kept as an unsupported marker and
//! rejected later by the normalizer, so one odd feature never fails the load.

use anyhow::{bail, Context, Result};
use geo::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use crate::core::domain::{FacilitySource, RawFacility};
use crate::geometry::crs::{Crs, Layer};

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    properties: Option<serde_json::Map<String, Value>>,
    geometry: Option<GeoJsonGeometry>,
}

type Position = Vec<f64>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeoJsonGeometry {
    Point { coordinates: Position },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    #[serde(other)]
    Unsupported,
}

/// Load the point and polygon facility files into one geographic layer.
///
/// Point features are tagged [`FacilitySource::PointDerived`] and polygon
/// features [`FacilitySource::PolygonNative`].
pub fn load_facilities(points_path: &Path, polygons_path: &Path) -> Result<Layer<RawFacility>> {
    let mut facilities = parse_facility_geojson(points_path, FacilitySource::PointDerived)?;
    let polygons = parse_facility_geojson(polygons_path, FacilitySource::PolygonNative)?;
    facilities.extend(polygons);

    Ok(Layer::new(Crs::Wgs84, facilities))
}

/// Parse one GeoJSON file of facilities
pub fn parse_facility_geojson(path: &Path, source: FacilitySource) -> Result<Vec<RawFacility>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read GeoJSON file: {}", path.display()))?;

    parse_facility_geojson_str(&content, source)
        .with_context(|| format!("Invalid facility GeoJSON in {}", path.display()))
}

/// Parse facilities from a GeoJSON string
pub fn parse_facility_geojson_str(
    json_str: &str,
    source: FacilitySource,
) -> Result<Vec<RawFacility>> {
    let collection: FeatureCollection =
        serde_json::from_str(json_str).context("GeoJSON deserialization error")?;

    if collection.kind != "FeatureCollection" {
        bail!(
            "Expected a FeatureCollection, found '{}'",
            collection.kind
        );
    }

    collection
        .features
        .into_iter()
        .enumerate()
        .map(|(idx, feature)| {
            let id = feature_id(&feature, idx);
            let geometry = match feature.geometry {
                Some(geometry) => convert_geometry(geometry)
                    .with_context(|| format!("Bad coordinates in feature '{}'", id))?,
                None => None,
            };
            Ok(RawFacility {
                id,
                source,
                geometry,
            })
        })
        .collect()
}

/// Facility identifier: `osm_id`, then `id` from the properties, then the
/// feature id, falling back to the feature's position in the file.
fn feature_id(feature: &Feature, idx: usize) -> String {
    let from_properties = feature
        .properties
        .as_ref()
        .and_then(|p| p.get("osm_id").or_else(|| p.get("id")));

    from_properties
        .or(feature.id.as_ref())
        .and_then(|value| match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| idx.to_string())
}

fn convert_geometry(geometry: GeoJsonGeometry) -> Result<Option<Geometry<f64>>> {
    let converted = match geometry {
        GeoJsonGeometry::Point { coordinates } => {
            Some(Geometry::Point(Point::from(coord(&coordinates)?)))
        }
        GeoJsonGeometry::Polygon { coordinates } => Some(Geometry::Polygon(polygon(&coordinates)?)),
        GeoJsonGeometry::MultiPolygon { coordinates } => {
            let polygons = coordinates
                .iter()
                .map(|rings| polygon(rings))
                .collect::<Result<Vec<_>>>()?;
            Some(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
        }
        GeoJsonGeometry::Unsupported => None,
    };
    Ok(converted)
}

fn coord(position: &[f64]) -> Result<Coord<f64>> {
    match position {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => bail!("position needs at least two values, got {}", position.len()),
    }
}

fn polygon(rings: &[Vec<Position>]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| {
        ring.iter()
            .map(|p| coord(p))
            .collect::<Result<Vec<_>>>()
            .map(LineString::new)
    });

    let exterior = match rings.next() {
        Some(ring) => ring?,
        None => LineString::new(vec![]),
    };
    let interiors = rings.collect::<Result<Vec<_>>>()?;

    Ok(Polygon::new(exterior, interiors))
}
