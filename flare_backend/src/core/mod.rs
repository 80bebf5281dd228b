//! Core domain models for flare detection.
//!
//! This module defines the observation and facility records shared by every
//! pipeline stage.

pub mod domain;

pub use domain::{
    Facility, FacilityGeometry, FacilitySource, Observation, RawFacility, RawObservation,
};
