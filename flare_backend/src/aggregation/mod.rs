//! Cluster aggregation and reporting tables.
//!
//! # Components
//!
//! - [`aggregator`]: Per-cluster statistics and classification flags
//! - [`summary`]: Facility/temperature cross-tabulation and scatter samples
//!
//! # Example
//!
//! ```no_run
//! use vnf_flares::aggregation::{cross_tabulate, ClusterStatistics};
//!
//! # fn example(statistics: &[ClusterStatistics]) {
//! for row in cross_tabulate(statistics) {
//!     println!("{} {} {}", row.facility_match, row.temp_over_threshold, row.cluster_count);
//! }
//! # }
//! ```

pub mod aggregator;
pub mod summary;

pub use aggregator::{aggregate_clusters, statistics_to_dataframe, ClusterStatistics};
pub use summary::{
    cross_tab_to_dataframe, cross_tabulate, scatter_sample, scatter_to_dataframe, CrossTabRow,
    ScatterPoint,
};
