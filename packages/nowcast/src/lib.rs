#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Fetch side of the wildfire map.
//!
//! Holds the embedded area-of-interest registry, the dashboard
//! configuration file format, and an HTTP client for the nowcast API that
//! fetches every AOI concurrently into a
//! [`wildfire_map_risk::SnapshotTracker`]. [`mock`] fills the same tracker
//! offline.

pub mod areas;
pub mod client;
pub mod config;
pub mod mock;
mod retry;

pub use areas::{Area, all_areas};
pub use client::{NowcastClient, NowcastParams};
pub use config::{ConfigError, DashboardConfig, GridSize};
pub use mock::{fill_mock, mock_points};

/// Errors that can occur while talking to the nowcast API.
#[derive(Debug, thiserror::Error)]
pub enum NowcastError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The body parsed as JSON but is not a risk `FeatureCollection`.
    #[error("Malformed nowcast payload for {aoi}: {message}")]
    Payload { aoi: String, message: String },
}
