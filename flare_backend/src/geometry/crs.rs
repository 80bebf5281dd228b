//! Coordinate reference systems and CRS-tagged geometry layers.
//!
//! Every geometry that is buffered, unioned or joined must live in the same
//! projected CRS. Collections are carried as [`Layer`]s so the CRS travels
//! with the data and every cross-layer operation can check it.

use std::f64::consts::PI;

use geo::{Coord, MapCoords, Point};
use serde::{Deserialize, Serialize};

use crate::error::{FlareError, FlareResult};

/// Equatorial radius used by the spherical Web Mercator projection, in meters.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Latitude bound of the Web Mercator square, in degrees.
pub const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_6;

/// Supported coordinate reference systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// Geographic longitude/latitude in degrees (EPSG:4326).
    Wgs84,
    /// Spherical Mercator in meters (EPSG:3857).
    WebMercator,
}

impl Crs {
    pub fn epsg(self) -> u32 {
        match self {
            Crs::Wgs84 => 4326,
            Crs::WebMercator => 3857,
        }
    }

    /// Projected CRSs have planar units, so metric buffers are meaningful.
    pub fn is_projected(self) -> bool {
        matches!(self, Crs::WebMercator)
    }

    /// URN form used in exported GeoJSON.
    pub fn urn(self) -> String {
        format!("urn:ogc:def:crs:EPSG::{}", self.epsg())
    }
}

/// A collection of records that share one CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer<T> {
    crs: Crs,
    items: Vec<T>,
}

impl<T> Layer<T> {
    pub fn new(crs: Crs, items: Vec<T>) -> Self {
        Self { crs, items }
    }

    pub fn empty(crs: Crs) -> Self {
        Self::new(crs, Vec::new())
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Fails with `CrsMismatch` unless `other` is in the same CRS.
    pub fn ensure_same_crs<U>(&self, other: &Layer<U>) -> FlareResult<()> {
        if self.crs == other.crs {
            Ok(())
        } else {
            Err(FlareError::CrsMismatch {
                expected: self.crs,
                found: other.crs,
            })
        }
    }

    /// Fails with `CrsMismatch` unless the layer is in a projected CRS.
    pub fn ensure_projected(&self) -> FlareResult<()> {
        if self.crs.is_projected() {
            Ok(())
        } else {
            Err(FlareError::CrsMismatch {
                expected: Crs::WebMercator,
                found: self.crs,
            })
        }
    }
}

/// Transforms a single coordinate between two CRSs.
///
/// Only the geographic to Web Mercator direction is supported, plus the
/// identity. Non-finite input and latitudes outside the Mercator square are
/// rejected as invalid geometry.
pub fn transform_coord(coord: Coord<f64>, from: Crs, to: Crs) -> Result<Coord<f64>, String> {
    if !coord.x.is_finite() || !coord.y.is_finite() {
        return Err(format!("non-finite coordinate ({}, {})", coord.x, coord.y));
    }

    match (from, to) {
        (a, b) if a == b => Ok(coord),
        (Crs::Wgs84, Crs::WebMercator) => {
            let (lon, lat) = (coord.x, coord.y);
            if !(-180.0..=180.0).contains(&lon) {
                return Err(format!("longitude {} out of range", lon));
            }
            if lat.abs() > MAX_MERCATOR_LATITUDE {
                return Err(format!("latitude {} outside the Mercator range", lat));
            }
            let x = EARTH_RADIUS_M * lon.to_radians();
            let y = EARTH_RADIUS_M * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
            Ok(Coord { x, y })
        }
        (from, to) => Err(format!(
            "unsupported transform EPSG:{} -> EPSG:{}",
            from.epsg(),
            to.epsg()
        )),
    }
}

/// Reprojects any geometry whose coordinates can be mapped.
pub fn reproject<G>(geometry: &G, from: Crs, to: Crs) -> Result<G::Output, String>
where
    G: MapCoords<f64, f64>,
{
    geometry.try_map_coords(|c| transform_coord(c, from, to))
}

/// Projects a longitude/latitude pair given in degrees.
pub fn project_lon_lat(lon: f64, lat: f64, to: Crs) -> Result<Point<f64>, String> {
    transform_coord(Coord { x: lon, y: lat }, Crs::Wgs84, to).map(Point::from)
}
