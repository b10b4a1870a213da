#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the wildfire risk map engine.
//!
//! `lookup` resolves a coordinate to its district, `report` prints the
//! statistics panel and alert board for a snapshot, and `render` drives
//! the layer engine against an in-memory map and prints the resulting
//! rendering instructions.

mod pipeline;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use wildfire_map_layers::state::SurfaceSnapshot;
use wildfire_map_layers::{
    LayerSyncEngine, MapLayerState, Marker, MarkerLayer, StaticImageLoader, SurfaceOp,
    SyncOutcome, ViewportEvent, ViewportTracker,
};
use wildfire_map_nowcast::{Area, all_areas};
use wildfire_map_risk::{AlertBoard, AoiStatus, aggregate, build_alert_board, compass_label};
use wildfire_map_risk_models::{BoundingBox, CellPressed, RegionStats};
use wildfire_map_spatial::SpatialIndex;

use crate::pipeline::InputArgs;

/// Pointer tolerance for the simulated click, in degrees.
const CLICK_RADIUS: f64 = 0.02;

#[derive(Parser)]
#[command(name = "wildfire_map")]
#[command(about = "Wildfire risk map engine")]
struct Cli {
    /// Dashboard config file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a coordinate to its administrative district.
    Lookup {
        /// Administrative boundary `GeoJSON`.
        #[arg(long)]
        boundaries: PathBuf,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
    },

    /// Print regional statistics and the alert board as JSON.
    Report {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Sync the risk layers onto an in-memory map and print the journal.
    Render {
        #[command(flatten)]
        input: InputArgs,

        /// JSON array of `{ "id", "coord": [lon, lat] }` fire stations.
        #[arg(long)]
        stations: Option<PathBuf>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AreaReport<'a> {
    id: &'a str,
    #[serde(flatten)]
    status: &'a AoiStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    areas: Vec<AreaReport<'a>>,
    cells: usize,
    hotspots: usize,
    stats: Option<RegionStats>,
    wind: String,
    alerts: AlertBoard,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderOutput<'a> {
    outcomes: Vec<SyncOutcome>,
    viewport: Option<BoundingBox>,
    journal: Vec<SurfaceOp>,
    surface: SurfaceSnapshot<'a>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Lookup {
            boundaries,
            lon,
            lat,
        } => cmd_lookup(&boundaries, lon, lat),
        Commands::Report { input } => cmd_report(cli.config.as_deref(), &input).await,
        Commands::Render { input, stations } => {
            cmd_render(cli.config.as_deref(), &input, stations.as_deref()).await
        }
    }
}

fn cmd_lookup(boundaries: &Path, lon: f64, lat: f64) -> Result<(), Box<dyn std::error::Error>> {
    let index = SpatialIndex::from_path(boundaries)?;
    println!("{}", serde_json::to_string_pretty(&index.lookup(lon, lat))?);
    Ok(())
}

async fn cmd_report(
    config_path: Option<&Path>,
    input: &InputArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = pipeline::resolve_config(config_path, input)?;
    let areas = all_areas();
    let tracker = pipeline::load_snapshot(&config, input, &areas).await;
    let enriched = pipeline::enrich(&config, &tracker)?;

    let stats = aggregate(&enriched);
    let wind = compass_label(stats.as_ref().and_then(|s| s.mean_wind_direction_deg));
    let statuses = tracker.statuses();

    let report = Report {
        areas: statuses
            .iter()
            .map(|&(id, status)| AreaReport { id, status })
            .collect(),
        cells: enriched.len(),
        hotspots: enriched.iter().filter(|p| p.is_hotspot).count(),
        stats,
        wind,
        alerts: build_alert_board(&enriched, config.leaderboard_size),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_render(
    config_path: Option<&Path>,
    input: &InputArgs,
    stations: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = pipeline::resolve_config(config_path, input)?;
    let areas = all_areas();
    let tracker = pipeline::load_snapshot(&config, input, &areas).await;
    let enriched = pipeline::enrich(&config, &tracker)?;
    let display = config.display();

    let mut state = MapLayerState::new(union_bounds(&areas));
    let mut viewport = ViewportTracker::new();
    viewport.on_viewport_settled(|bbox| log::info!("Viewport settled: {bbox:?}"));

    let mut engine = LayerSyncEngine::default();
    engine.set_on_cell_pressed(Rc::new(|cell: CellPressed| {
        log::info!(
            "Cell pressed: {} risk={:?}",
            cell.city_label.as_deref().unwrap_or("-"),
            cell.risk
        );
    }));

    // First pass lands before the style is ready and is deferred.
    let mut outcomes = vec![engine.sync(Some(&mut state), &enriched, display)?];

    if let Some(path) = stations {
        let markers: Vec<Marker> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        let outcome = MarkerLayer::default()
            .sync(Some(&mut state), &markers, &StaticImageLoader)
            .await?;
        log::info!("Marker layer: {outcome:?} ({} stations)", markers.len());
    }

    state.finish_style_load();
    let settled = viewport.handle(ViewportEvent::Load, &state);

    outcomes.push(engine.sync(Some(&mut state), &enriched, display)?);

    if let Some(hot) = enriched.iter().find(|p| p.is_hotspot) {
        state.click_at(hot.coordinate, CLICK_RADIUS);
    }

    let journal = state.take_journal();
    let output = RenderOutput {
        outcomes,
        viewport: settled,
        journal,
        surface: state.snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn union_bounds(areas: &[Area]) -> BoundingBox {
    areas
        .iter()
        .map(|area| area.bbox)
        .reduce(|a, b| {
            BoundingBox::new(
                a.min_lon.min(b.min_lon),
                a.min_lat.min(b.min_lat),
                a.max_lon.max(b.max_lon),
                a.max_lat.max(b.max_lat),
            )
        })
        .unwrap_or(BoundingBox::new(-180.0, -90.0, 180.0, 90.0))
}
