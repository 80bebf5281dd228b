//! Property-based checks of the clustering partition and summaries.

use std::collections::HashMap;

use chrono::NaiveDate;
use geo::{Intersects, Point, Relate};
use proptest::prelude::*;

use vnf_flares::clustering::build_clusters;
use vnf_flares::config::PipelineConfig;
use vnf_flares::core::RawObservation;
use vnf_flares::geometry::crs::{Crs, Layer};
use vnf_flares::geometry::{buffer_point, BufferedObservation};
use vnf_flares::{FlarePipeline, PipelineOutput};

fn observations(points: &[(f64, f64, u32, f64)]) -> Vec<RawObservation> {
    points
        .iter()
        .enumerate()
        .map(|(i, &(lon, lat, day, temp))| RawObservation {
            id: i as i64,
            lon_gmtco: Some(lon),
            lat_gmtco: Some(lat),
            date_mscan: NaiveDate::from_ymd_opt(2017, 8, day).and_then(|d| d.and_hms_opt(1, 30, 0)),
            temp_bb: Some(temp),
            radiant_heat_intensity: Some(1.0),
            radiant_heat: Some(1.0),
            area_bb: Some(0.01),
            sample_m10: Some(1.0),
            ..Default::default()
        })
        .collect()
}

fn run(points: &[(f64, f64, u32, f64)], radius: f64) -> PipelineOutput {
    let mut config = PipelineConfig::default();
    config.clustering.buffer_radius = radius;
    FlarePipeline::with_config(config)
        .run(&observations(points), &Layer::empty(Crs::Wgs84))
        .unwrap()
}

fn cluster_of(output: &PipelineOutput) -> HashMap<i64, usize> {
    output.assignments.iter().copied().collect()
}

/// Positions within a few kilometres of each other, so some buffers overlap.
fn scene() -> impl Strategy<Value = Vec<(f64, f64, u32, f64)>> {
    prop::collection::vec(
        (-0.03..0.03f64, 10.0..10.03f64, 1u32..=28, 800.0..2000.0f64),
        1..25,
    )
}

const RADIUS: f64 = 500.0;

fn projected_buffers(points: &[(f64, f64)]) -> Layer<BufferedObservation> {
    let items = points
        .iter()
        .enumerate()
        .map(|(observation, &(x, y))| BufferedObservation {
            observation,
            center: Point::new(x, y),
            radius: RADIUS,
            area: buffer_point(Point::new(x, y), RADIUS, 64).unwrap(),
        })
        .collect();
    Layer::new(Crs::WebMercator, items)
}

/// Projected positions on a 6 km square, dense enough for chains and
/// near-tangent pairs.
fn projected_scene() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((0.0..6000.0f64, 0.0..6000.0f64), 1..20)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_cluster_geometries_are_disjoint(points in projected_scene()) {
        let clusters = build_clusters(&projected_buffers(&points)).unwrap();
        let items = clusters.items();

        for a in 0..items.len() {
            for b in (a + 1)..items.len() {
                prop_assert!(
                    !items[a].geometry.intersects(&items[b].geometry),
                    "clusters {} and {} intersect",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn prop_each_buffer_inside_exactly_one_cluster(points in projected_scene()) {
        let buffers = projected_buffers(&points);
        let clusters = build_clusters(&buffers).unwrap();

        for buffer in buffers.iter() {
            // A hair smaller than the buffer, so vertex rounding in the union
            // cannot turn a shared edge into a spurious miss
            let core = buffer_point(buffer.center, RADIUS - 0.01, 64).unwrap();

            let holders: Vec<usize> = clusters
                .iter()
                .filter(|c| c.geometry.intersects(&core))
                .map(|c| c.index)
                .collect();
            prop_assert_eq!(
                holders.len(),
                1,
                "buffer {} in clusters {:?}",
                buffer.observation,
                holders
            );

            let holder = &clusters.items()[holders[0]];
            prop_assert!(holder.geometry.relate(&core).is_contains());
        }

        let members: usize = clusters.iter().map(|c| c.buffer_count).sum();
        prop_assert_eq!(members, buffers.len());
    }

    #[test]
    fn prop_every_observation_in_exactly_one_cluster(points in scene()) {
        let output = run(&points, 500.0);

        prop_assert_eq!(output.assignments.len(), points.len());
        let ids: std::collections::HashSet<i64> =
            output.assignments.iter().map(|(id, _)| *id).collect();
        prop_assert_eq!(ids.len(), points.len());

        let counted: usize = output.statistics.iter().map(|s| s.observation_count).sum();
        prop_assert_eq!(counted, points.len());
        prop_assert!(output.statistics.iter().all(|s| s.observation_count > 0));
    }

    #[test]
    fn prop_larger_radius_never_splits_clusters(points in scene()) {
        let small = run(&points, 300.0);
        let large = run(&points, 900.0);
        prop_assert!(large.statistics.len() <= small.statistics.len());

        let small_of = cluster_of(&small);
        let large_of = cluster_of(&large);
        for (a, ca) in &small_of {
            for (b, cb) in &small_of {
                if ca == cb {
                    prop_assert_eq!(large_of[a], large_of[b]);
                }
            }
        }
    }

    #[test]
    fn prop_range_days_at_least_one(points in scene()) {
        let output = run(&points, 500.0);
        for s in &output.statistics {
            prop_assert!(s.observation_range_days >= 1);
            prop_assert!(s.date_min <= s.date_max);
            prop_assert!(s.temp_median <= s.temp_max);
        }
    }

    #[test]
    fn prop_cross_tab_sums_to_cluster_count(points in scene()) {
        let output = run(&points, 500.0);
        prop_assert_eq!(output.cross_tab.len(), 4);
        let total: usize = output.cross_tab.iter().map(|r| r.cluster_count).sum();
        prop_assert_eq!(total, output.statistics.len());
        prop_assert_eq!(output.scatter.len(), output.statistics.len());
    }

    #[test]
    fn prop_rerun_is_stable(points in scene()) {
        let first = run(&points, 500.0);
        let second = run(&points, 500.0);
        prop_assert_eq!(first.assignments, second.assignments);
    }
}
