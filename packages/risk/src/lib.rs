#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Risk-cell processing for the wildfire map.
//!
//! The pipeline is one-directional: fetch results are collected per AOI
//! in a [`snapshot::SnapshotTracker`], merged, enriched by
//! [`enrich::FeatureEnricher`], and then projected into statistics
//! ([`aggregate`]) and alert views ([`alerts`]) while the layer engine
//! draws the same enriched cells.

pub mod aggregate;
pub mod alerts;
pub mod classify;
pub mod enrich;
pub mod snapshot;

pub use aggregate::{aggregate, compass_label, top_n};
pub use alerts::{AlertBoard, build_alert_board};
pub use classify::{color_for, is_hotspot};
pub use enrich::{FeatureEnricher, merge_areas};
pub use snapshot::{AoiStatus, SnapshotTracker, SnapshotVersion, points_from_collection};
