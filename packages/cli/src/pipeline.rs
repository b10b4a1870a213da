//! Config resolution, snapshot loading and enrichment shared by the
//! `report` and `render` commands.

use std::path::{Path, PathBuf};

use clap::Args;
use wildfire_map_nowcast::client::parse_payload;
use wildfire_map_nowcast::{Area, DashboardConfig, NowcastClient, NowcastParams, fill_mock};
use wildfire_map_risk::{FeatureEnricher, SnapshotTracker};
use wildfire_map_risk_models::{EnrichedPoint, RiskPoint, RiskProvider};
use wildfire_map_spatial::SpatialIndex;

/// Inputs shared by commands that build an enriched snapshot.
#[derive(Args)]
pub struct InputArgs {
    /// Administrative boundary `GeoJSON` for district lookup.
    #[arg(long)]
    pub boundaries: Option<PathBuf>,

    /// Directory of `<aoi_id>.geojson` snapshots. Fetches from the API
    /// when omitted.
    #[arg(long, conflicts_with = "mock")]
    pub snapshot_dir: Option<PathBuf>,

    /// Generate an offline demo grid instead of calling the API.
    #[arg(long)]
    pub mock: bool,

    /// Risk layer opacity in [0, 1].
    #[arg(long)]
    pub opacity: Option<f64>,

    /// Hotspot threshold in [0, 1].
    #[arg(long)]
    pub hot_threshold: Option<f64>,

    /// Forecast hour relative to now.
    #[arg(long)]
    pub hour_offset: Option<i32>,

    /// Risk provider (`heuristic` or `ai`).
    #[arg(long)]
    pub provider: Option<String>,
}

/// Loads the config file, if any, and applies command-line overrides.
pub fn resolve_config(
    path: Option<&Path>,
    input: &InputArgs,
) -> Result<DashboardConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::default(),
    };

    if let Some(opacity) = input.opacity {
        config.opacity = opacity;
    }
    if let Some(threshold) = input.hot_threshold {
        config.hot_threshold = threshold;
    }
    if let Some(hour_offset) = input.hour_offset {
        config.hour_offset = hour_offset;
    }
    if let Some(provider) = &input.provider {
        config.provider = provider
            .parse::<RiskProvider>()
            .map_err(|_| format!("Unknown provider: {provider}"))?;
    }
    if let Some(boundaries) = &input.boundaries {
        config.boundaries_path = Some(boundaries.clone());
    }

    config.validate()?;
    Ok(config)
}

/// Fills a fresh snapshot from files, the mock grid or the nowcast API.
pub async fn load_snapshot(
    config: &DashboardConfig,
    input: &InputArgs,
    areas: &[Area],
) -> SnapshotTracker {
    let mut tracker = SnapshotTracker::new(areas.iter().map(|area| area.id.clone()));

    if input.mock {
        fill_mock(areas, NowcastParams::from(config), &mut tracker);
    } else if let Some(dir) = input.snapshot_dir.as_deref() {
        let version = tracker.issue();
        for area in areas {
            let path = dir.join(format!("{}.geojson", area.id));
            match read_area(&path, area) {
                Ok(points) => {
                    tracker.accept(version, &area.id, points);
                }
                Err(e) => {
                    tracker.fail(version, &area.id, format!("{}: {e}", path.display()));
                }
            }
        }
    } else {
        NowcastClient::new(&config.api_base_url)
            .fetch_all(areas, NowcastParams::from(config), &mut tracker)
            .await;
    }

    tracker
}

fn read_area(path: &Path, area: &Area) -> Result<Vec<RiskPoint>, Box<dyn std::error::Error>> {
    let body: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    Ok(parse_payload(body, area)?)
}

/// Enriches the merged snapshot against the configured boundaries.
pub fn enrich(
    config: &DashboardConfig,
    tracker: &SnapshotTracker,
) -> Result<Vec<EnrichedPoint>, Box<dyn std::error::Error>> {
    let index = config
        .boundaries_path
        .as_deref()
        .map(SpatialIndex::from_path)
        .transpose()?;

    Ok(FeatureEnricher::new(index.as_ref()).enrich(
        &tracker.merged(),
        config.opacity,
        config.hot_threshold,
    ))
}
