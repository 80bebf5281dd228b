//! End-to-end scenarios for the flare pipeline.
//!
//! Observations are placed near the equator, where a metre offset converts
//! to degrees with the sphere radius alone.

use chrono::{NaiveDate, NaiveDateTime};
use geo::{polygon, Geometry, Point};

use vnf_flares::clustering::build_clusters;
use vnf_flares::config::{InvalidRecordPolicy, PipelineConfig};
use vnf_flares::core::{FacilitySource, Observation, RawFacility, RawObservation};
use vnf_flares::geometry::crs::{Crs, Layer, EARTH_RADIUS_M};
use vnf_flares::geometry::GeometryNormalizer;
use vnf_flares::{FlareError, FlarePipeline, Stage};

// ==================== Helper Functions ====================

fn meters_to_degrees(meters: f64) -> f64 {
    (meters / EARTH_RADIUS_M).to_degrees()
}

fn scan(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2017, 5, day)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .unwrap()
}

fn observation(id: i64, east_m: f64, north_m: f64, at: NaiveDateTime, temp: f64) -> RawObservation {
    RawObservation {
        id,
        lat_gmtco: Some(meters_to_degrees(north_m)),
        lon_gmtco: Some(meters_to_degrees(east_m)),
        date_mscan: Some(at),
        temp_bb: Some(temp),
        radiant_heat_intensity: Some(2.5),
        radiant_heat: Some(0.8),
        area_bb: Some(0.004),
        sample_m10: Some(2.0),
        ..Default::default()
    }
}

/// Square facility outline, in metres from the origin.
fn square_facility(id: &str, west_m: f64, south_m: f64, size_m: f64) -> RawFacility {
    let (x0, y0) = (meters_to_degrees(west_m), meters_to_degrees(south_m));
    let (x1, y1) = (meters_to_degrees(west_m + size_m), meters_to_degrees(south_m + size_m));
    RawFacility {
        id: id.to_string(),
        source: FacilitySource::PolygonNative,
        geometry: Some(Geometry::Polygon(polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
            (x: x0, y: y0),
        ])),
    }
}

fn no_facilities() -> Layer<RawFacility> {
    Layer::empty(Crs::Wgs84)
}

// ==================== Scenarios ====================

#[test]
fn test_same_point_forms_single_cluster() {
    let observations = vec![
        observation(1, 0.0, 0.0, scan(1, 1), 1500.0),
        observation(2, 0.0, 0.0, scan(1, 2), 1500.0),
    ];

    let output = FlarePipeline::new().run(&observations, &no_facilities()).unwrap();

    assert_eq!(output.statistics.len(), 1);
    assert_eq!(output.statistics[0].observation_count, 2);
    assert_eq!(output.statistics[0].observation_range_days, 1);
}

#[test]
fn test_tangent_buffers_merge() {
    let normalizer = GeometryNormalizer::new(Crs::WebMercator, InvalidRecordPolicy::Abort, 64);
    let projected = |id: i64, x: f64| Observation {
        id,
        lat: 0.0,
        lon: 0.0,
        location: Point::new(x, 0.0),
        scanned_at: scan(1, 0),
        temp_bb: 1500.0,
        radiant_heat_intensity: 1.0,
        radiant_heat: 1.0,
        area_bb: 0.01,
        sample_m10: 1.0,
    };

    let touching = Layer::new(Crs::WebMercator, vec![projected(1, 0.0), projected(2, 1000.0)]);
    let buffers = normalizer.buffer_observations(&touching, 500.0).unwrap();
    let clusters = build_clusters(&buffers).unwrap();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters.items()[0].buffer_count, 2);

    let apart = Layer::new(Crs::WebMercator, vec![projected(1, 0.0), projected(2, 1000.01)]);
    let buffers = normalizer.buffer_observations(&apart, 500.0).unwrap();
    assert_eq!(build_clusters(&buffers).unwrap().len(), 2);
}

#[test]
fn test_hot_observation_inside_facility() {
    let observations = vec![observation(1, 0.0, 0.0, scan(3, 4), 1500.0)];
    let facilities = Layer::new(Crs::Wgs84, vec![square_facility("pad", -50.0, -50.0, 100.0)]);

    let output = FlarePipeline::new().run(&observations, &facilities).unwrap();

    let stats = &output.statistics[0];
    assert_eq!(stats.observation_count, 1);
    assert_eq!(stats.observation_range_days, 1);
    assert!(stats.temp_over_threshold);
    assert!(stats.facility_match);
    assert_eq!(stats.facility_overlap_count, 1);
}

#[test]
fn test_cool_cluster_stays_below_threshold() {
    let observations: Vec<RawObservation> = (0..10)
        .map(|i| {
            let day = 1 + (i as u32 % 5);
            let temp = if i % 2 == 0 { 1100.0 } else { 1300.0 };
            observation(i + 1, i as f64 * 20.0, 0.0, scan(day, 12), temp)
        })
        .collect();

    let output = FlarePipeline::new().run(&observations, &no_facilities()).unwrap();

    assert_eq!(output.statistics.len(), 1);
    let stats = &output.statistics[0];
    assert_eq!(stats.observation_count, 10);
    assert_eq!(stats.observation_range_days, 5);
    assert!((stats.temp_mean - 1200.0).abs() < 1e-9);
    assert!(!stats.temp_over_threshold);
    assert!(!stats.facility_match);
}

#[test]
fn test_cluster_overlapping_two_facilities() {
    let observations = vec![observation(1, 0.0, 0.0, scan(2, 0), 1600.0)];
    let facilities = Layer::new(
        Crs::Wgs84,
        vec![
            square_facility("east", 300.0, -50.0, 400.0),
            square_facility("west", -700.0, -50.0, 400.0),
            square_facility("far", 5000.0, 5000.0, 100.0),
        ],
    );

    let output = FlarePipeline::new().run(&observations, &facilities).unwrap();

    let stats = &output.statistics[0];
    assert_eq!(stats.facility_overlap_count, 2);
    assert!(stats.facility_match);
    assert_eq!(output.report.facility_polygons, 3);
}

#[test]
fn test_point_facility_is_buffered() {
    let observations = vec![observation(1, 0.0, 0.0, scan(2, 0), 1600.0)];
    // 900 m away: the 500 m facility buffer reaches the 500 m cluster
    let facilities = Layer::new(
        Crs::Wgs84,
        vec![RawFacility {
            id: "well".to_string(),
            source: FacilitySource::PointDerived,
            geometry: Some(Geometry::Point(Point::new(meters_to_degrees(900.0), 0.0))),
        }],
    );

    let output = FlarePipeline::new().run(&observations, &facilities).unwrap();
    assert!(output.statistics[0].facility_match);
    assert_eq!(output.report.facility_points, 1);
}

#[test]
fn test_rerun_gives_identical_partition() {
    let observations: Vec<RawObservation> = (0..25)
        .map(|i| {
            let east = (i % 5) as f64 * 700.0 + (i / 5) as f64 * 3000.0;
            let north = (i % 3) as f64 * 150.0;
            let temp = 1300.0 + i as f64 * 20.0;
            observation(i + 1, east, north, scan(1 + i as u32 % 7, 0), temp)
        })
        .collect();
    let pipeline = FlarePipeline::new();

    let first = pipeline.run(&observations, &no_facilities()).unwrap();
    let second = pipeline.run(&observations, &no_facilities()).unwrap();

    assert_eq!(first.assignments, second.assignments);
    assert_eq!(first.statistics, second.statistics);
    assert_eq!(first.cross_tab, second.cross_tab);
}

#[test]
fn test_cross_tab_sums_to_cluster_count() {
    let observations = vec![
        observation(1, 0.0, 0.0, scan(1, 0), 1500.0),
        observation(2, 5000.0, 0.0, scan(1, 0), 1000.0),
        observation(3, 10000.0, 0.0, scan(1, 0), 1700.0),
    ];
    let facilities = Layer::new(Crs::Wgs84, vec![square_facility("pad", 9950.0, -50.0, 100.0)]);

    let output = FlarePipeline::new().run(&observations, &facilities).unwrap();

    let total: usize = output.cross_tab.iter().map(|r| r.cluster_count).sum();
    assert_eq!(total, output.statistics.len());
    let matched_hot = output
        .cross_tab
        .iter()
        .find(|r| r.facility_match && r.temp_over_threshold)
        .unwrap();
    assert_eq!(matched_hot.cluster_count, 1);
}

#[test]
fn test_invalid_facility_aborts_by_default() {
    let observations = vec![observation(1, 0.0, 0.0, scan(1, 0), 1500.0)];
    let facilities = Layer::new(
        Crs::Wgs84,
        vec![RawFacility {
            id: "broken".to_string(),
            source: FacilitySource::PolygonNative,
            geometry: None,
        }],
    );

    let err = FlarePipeline::new().run(&observations, &facilities).unwrap_err();
    assert_eq!(err.stage, Stage::Normalize);
    assert!(matches!(err.source, FlareError::InvalidGeometry { .. }));
    assert!(err.to_string().contains("normalize"));
}

#[test]
fn test_invalid_facility_skipped_when_configured() {
    let mut config = PipelineConfig::default();
    config.ingest.invalid_records = InvalidRecordPolicy::Skip;

    let observations = vec![observation(1, 0.0, 0.0, scan(1, 0), 1500.0)];
    let facilities = Layer::new(
        Crs::Wgs84,
        vec![
            RawFacility {
                id: "broken".to_string(),
                source: FacilitySource::PolygonNative,
                geometry: None,
            },
            square_facility("pad", -50.0, -50.0, 100.0),
        ],
    );

    let output = FlarePipeline::with_config(config)
        .run(&observations, &facilities)
        .unwrap();

    assert_eq!(output.report.facilities_skipped, 1);
    assert!(output.statistics[0].facility_match);
}
