//! Client for the `/risk/nowcast` endpoint.
//!
//! One request per AOI returns a `FeatureCollection` of grid cells for the
//! AOI's bounding box. [`NowcastClient::fetch_all`] issues a new snapshot
//! version, fetches every AOI concurrently, and feeds each result into the
//! tracker as soon as it arrives.

use futures::stream::{self, StreamExt as _};
use wildfire_map_risk::{SnapshotTracker, SnapshotVersion, points_from_collection};
use wildfire_map_risk_models::{RiskPoint, RiskProvider};

use crate::NowcastError;
use crate::areas::Area;
use crate::config::{DashboardConfig, GridSize};
use crate::retry;

/// Request parameters shared by every AOI of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NowcastParams {
    pub grid: GridSize,
    pub hour_offset: i32,
    pub provider: RiskProvider,
}

impl From<&DashboardConfig> for NowcastParams {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            grid: config.grid,
            hour_offset: config.hour_offset,
            provider: config.provider,
        }
    }
}

/// Query string pairs for one AOI request.
#[must_use]
pub fn query_pairs(area: &Area, params: NowcastParams) -> Vec<(&'static str, String)> {
    vec![
        ("minLon", area.bbox.min_lon.to_string()),
        ("minLat", area.bbox.min_lat.to_string()),
        ("maxLon", area.bbox.max_lon.to_string()),
        ("maxLat", area.bbox.max_lat.to_string()),
        ("nx", params.grid.nx.to_string()),
        ("ny", params.grid.ny.to_string()),
        ("hourOffset", params.hour_offset.to_string()),
        ("provider", params.provider.to_string()),
    ]
}

/// Converts a response body into AOI-tagged risk points.
///
/// # Errors
///
/// * [`NowcastError::Payload`] if the body is not a `FeatureCollection`
pub fn parse_payload(body: serde_json::Value, area: &Area) -> Result<Vec<RiskPoint>, NowcastError> {
    let collection = geojson::FeatureCollection::try_from(body).map_err(|e| {
        NowcastError::Payload {
            aoi: area.id.clone(),
            message: e.to_string(),
        }
    })?;
    Ok(points_from_collection(
        &collection,
        &area.id,
        Some(&area.name),
    ))
}

pub struct NowcastClient {
    http: reqwest::Client,
    base_url: String,
    /// Maximum number of AOI requests in flight.
    concurrency: usize,
}

impl NowcastClient {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            concurrency: 4,
        }
    }

    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = if concurrency == 0 { 1 } else { concurrency };
        self
    }

    #[must_use]
    pub fn nowcast_url(&self) -> String {
        format!("{}/risk/nowcast", self.base_url)
    }

    /// Fetches the cells of one AOI.
    ///
    /// # Errors
    ///
    /// * If the request fails or the payload is malformed
    pub async fn fetch_area(
        &self,
        area: &Area,
        params: NowcastParams,
    ) -> Result<Vec<RiskPoint>, NowcastError> {
        let url = self.nowcast_url();
        let query = query_pairs(area, params);
        log::info!(
            "Fetching nowcast for {} (hour offset {}, {})",
            area.id,
            params.hour_offset,
            params.provider
        );

        let body = retry::send_json(|| self.http.get(&url).query(&query)).await?;
        let points = parse_payload(body, area)?;
        log::debug!("Received {} cells for {}", points.len(), area.id);
        Ok(points)
    }

    /// Fetches every AOI into a fresh snapshot version of `tracker`.
    ///
    /// Failed AOIs are marked unavailable; the others still load.
    pub async fn fetch_all(
        &self,
        areas: &[Area],
        params: NowcastParams,
        tracker: &mut SnapshotTracker,
    ) -> SnapshotVersion {
        let version = tracker.issue();

        let mut results = stream::iter(areas.iter().map(|area| async move {
            (area, self.fetch_area(area, params).await)
        }))
        .buffer_unordered(self.concurrency);

        while let Some((area, result)) = results.next().await {
            match result {
                Ok(points) => {
                    tracker.accept(version, &area.id, points);
                }
                Err(e) => {
                    tracker.fail(version, &area.id, e.to_string());
                }
            }
        }

        version
    }
}
