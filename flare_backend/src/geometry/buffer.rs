//! Circular buffers around point geometries.

use std::f64::consts::{PI, TAU};

use geo::{Coord, LineString, Point, Polygon};

/// Smallest polygon resolution accepted for a buffer circle.
pub const MIN_CIRCLE_SEGMENTS: usize = 8;

/// Replaces a point with a regular polygon approximating the circle of
/// `radius` around it.
///
/// Vertices lie on the circle, so the polygon is inscribed: it never reaches
/// outside the true buffer and buffers of points further than `2 * radius`
/// apart can never overlap.
pub fn buffer_point(
    center: Point<f64>,
    radius: f64,
    segments: usize,
) -> Result<Polygon<f64>, String> {
    if !radius.is_finite() || radius <= 0.0 {
        return Err(format!("buffer radius must be positive, got {}", radius));
    }
    if segments < MIN_CIRCLE_SEGMENTS {
        return Err(format!(
            "buffer needs at least {} segments, got {}",
            MIN_CIRCLE_SEGMENTS, segments
        ));
    }
    if !center.x().is_finite() || !center.y().is_finite() {
        return Err("buffer center is not finite".to_string());
    }

    let mut ring: Vec<Coord<f64>> = (0..segments)
        .map(|i| {
            let angle = TAU * i as f64 / segments as f64;
            Coord {
                x: center.x() + radius * angle.cos(),
                y: center.y() + radius * angle.sin(),
            }
        })
        .collect();
    ring.push(ring[0]);

    Ok(Polygon::new(LineString::new(ring), vec![]))
}

/// Widest gap between a circle and its inscribed polygon, at each edge midpoint.
pub fn inscribed_gap(radius: f64, segments: usize) -> f64 {
    radius * (1.0 - (PI / segments.max(MIN_CIRCLE_SEGMENTS) as f64).cos())
}
