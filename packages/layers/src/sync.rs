//! Idempotent synchronization of enriched risk cells onto a map surface.
//!
//! Each call to [`LayerSyncEngine::sync`] produces a layer plan and
//! either applies it right away or parks it until the surface style has
//! loaded. Sources and layers are created on first use and only updated
//! in place afterwards; handlers are rebound through a
//! [`HandlerRegistry`] so there is never more than one per
//! `(event, layer)` pair.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use geojson::FeatureCollection;
use serde::Serialize;
use serde_json::{Value, json};
use wildfire_map_risk_models::{CellPressed, DisplayConfig, EnrichedPoint, to_feature_collection};

use crate::SurfaceError;
use crate::registry::HandlerRegistry;
use crate::surface::{Cursor, LayerEvent, LayerKind, LayerSpec, MapEventKind, MapSurface};

/// Radius of the base risk circles, in pixels.
const POINT_RADIUS: f64 = 6.0;

/// Radius of the hotspot rings, in pixels.
const HOTSPOT_RADIUS: f64 = 10.0;

const HOTSPOT_STROKE_COLOR: &str = "#7f1d1d";

/// Zoom above which the heatmap gives way to individual cells.
const HEATMAP_MAX_ZOOM: f64 = 14.0;

/// Receives the normalized payload of a clicked risk cell.
pub type CellCallback = Rc<dyn Fn(CellPressed)>;

/// Source and layer ids used by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerIds {
    pub source: String,
    pub heatmap: String,
    pub points: String,
    pub hotspots: String,
}

impl Default for LayerIds {
    fn default() -> Self {
        Self {
            source: "risk-src".to_string(),
            heatmap: "risk-heatmap".to_string(),
            points: "risk-points".to_string(),
            hotspots: "risk-hotspots".to_string(),
        }
    }
}

impl LayerIds {
    fn interactive(&self) -> [&str; 2] {
        [&self.points, &self.hotspots]
    }
}

/// What a call to [`LayerSyncEngine::sync`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// No surface yet; nothing happened.
    Skipped,
    /// Style still loading; the plan runs on the style-ready signal.
    Deferred,
    /// Sources and layers are up to date.
    Applied,
}

/// Everything needed to bring the surface up to date.
struct LayerPlan {
    ids: LayerIds,
    data: FeatureCollection,
    config: DisplayConfig,
}

impl LayerPlan {
    fn apply(self, surface: &mut dyn MapSurface) -> Result<(), SurfaceError> {
        let Self { ids, data, config } = self;

        if surface.has_source(&ids.source) {
            surface.set_source_data(&ids.source, data)?;
        } else {
            surface.add_source(&ids.source, data)?;
        }

        if surface.has_layer(&ids.heatmap) {
            surface.set_paint_property(&ids.heatmap, "heatmap-opacity", json!(config.opacity))?;
        } else {
            surface.add_layer(heatmap_layer(&ids, config.opacity))?;
        }

        if surface.has_layer(&ids.points) {
            surface.set_paint_property(&ids.points, "circle-opacity", json!(config.opacity))?;
        } else {
            surface.add_layer(points_layer(&ids, config.opacity))?;
        }

        if surface.has_layer(&ids.hotspots) {
            surface.set_filter(&ids.hotspots, Some(hotspot_filter(config.hot_threshold)))?;
        } else {
            surface.add_layer(hotspot_layer(&ids, config.hot_threshold))?;
        }

        Ok(())
    }
}

fn heatmap_layer(ids: &LayerIds, opacity: f64) -> LayerSpec {
    LayerSpec::new(&ids.heatmap, LayerKind::Heatmap, &ids.source)
        .maxzoom(HEATMAP_MAX_ZOOM)
        .paint("heatmap-weight", json!(["get", "risk"]))
        .paint(
            "heatmap-intensity",
            json!(["interpolate", ["linear"], ["zoom"], 5, 1, 9, 2.5]),
        )
        .paint(
            "heatmap-color",
            json!([
                "interpolate",
                ["linear"],
                ["heatmap-density"],
                0,
                "rgba(0,0,255,0)",
                0.1,
                "royalblue",
                0.3,
                "cyan",
                0.5,
                "lime",
                0.7,
                "yellow",
                1,
                "red"
            ]),
        )
        .paint(
            "heatmap-radius",
            json!(["interpolate", ["linear"], ["zoom"], 5, 20, 12, 50]),
        )
        .paint("heatmap-opacity", json!(opacity))
}

fn points_layer(ids: &LayerIds, opacity: f64) -> LayerSpec {
    LayerSpec::new(&ids.points, LayerKind::Circle, &ids.source)
        .paint("circle-color", json!(["get", "color"]))
        .paint("circle-opacity", json!(opacity))
        .paint("circle-radius", json!(POINT_RADIUS))
}

fn hotspot_layer(ids: &LayerIds, threshold: f64) -> LayerSpec {
    LayerSpec::new(&ids.hotspots, LayerKind::Circle, &ids.source)
        .paint("circle-radius", json!(HOTSPOT_RADIUS))
        .paint("circle-color", json!("rgba(0,0,0,0)"))
        .paint("circle-stroke-color", json!(HOTSPOT_STROKE_COLOR))
        .paint("circle-stroke-width", json!(2))
        .filter(hotspot_filter(threshold))
}

/// Filter selecting cells at or above `threshold`.
#[must_use]
pub fn hotspot_filter(threshold: f64) -> Value {
    json!([">=", ["get", "risk"], threshold])
}

/// Drives the risk source and its heatmap, point and hotspot layers.
pub struct LayerSyncEngine {
    ids: LayerIds,
    on_cell_pressed: Option<CellCallback>,
    registry: HandlerRegistry,
    pending: Rc<RefCell<Option<LayerPlan>>>,
    /// Pointer id of the last click turned into a [`CellPressed`].
    last_click: Rc<Cell<Option<u64>>>,
}

impl Default for LayerSyncEngine {
    fn default() -> Self {
        Self::new(LayerIds::default())
    }
}

impl LayerSyncEngine {
    #[must_use]
    pub fn new(ids: LayerIds) -> Self {
        Self {
            ids,
            on_cell_pressed: None,
            registry: HandlerRegistry::new(),
            pending: Rc::new(RefCell::new(None)),
            last_click: Rc::new(Cell::new(None)),
        }
    }

    #[must_use]
    pub const fn ids(&self) -> &LayerIds {
        &self.ids
    }

    /// Sets the click callback. Takes effect on the next [`Self::sync`].
    pub fn set_on_cell_pressed(&mut self, callback: CellCallback) {
        self.on_cell_pressed = Some(callback);
    }

    /// Whether a plan is waiting for the style to load.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    /// Brings the surface in line with `enriched` and `config`.
    ///
    /// Safe to call any number of times with the same inputs. While the
    /// style is loading only the newest plan is kept and it is applied
    /// exactly once when the style becomes ready.
    ///
    /// # Errors
    ///
    /// * If the surface rejects a create-or-update operation
    pub fn sync(
        &mut self,
        surface: Option<&mut dyn MapSurface>,
        enriched: &[EnrichedPoint],
        config: DisplayConfig,
    ) -> Result<SyncOutcome, SurfaceError> {
        let Some(surface) = surface else {
            log::debug!("Map surface not ready, skipping layer sync");
            return Ok(SyncOutcome::Skipped);
        };

        let plan = LayerPlan {
            ids: self.ids.clone(),
            data: to_feature_collection(enriched),
            config: config.clamped(),
        };

        self.bind_handlers(surface);

        if surface.is_style_loaded() {
            self.pending.borrow_mut().take();
            plan.apply(surface)?;
            return Ok(SyncOutcome::Applied);
        }

        let already_scheduled = self.pending.borrow_mut().replace(plan).is_some();
        if !already_scheduled {
            log::debug!("Style not loaded, deferring layer sync");
            let pending = Rc::clone(&self.pending);
            surface.once_style_ready(Box::new(move |surface: &mut dyn MapSurface| {
                let plan = pending.borrow_mut().take();
                if let Some(plan) = plan
                    && let Err(e) = plan.apply(surface)
                {
                    log::warn!("Deferred layer sync failed: {e}");
                }
            }));
        }

        Ok(SyncOutcome::Deferred)
    }

    /// Unbinds every handler the engine bound.
    pub fn dispose(&mut self, surface: &mut dyn MapSurface) {
        self.registry.unbind_all(surface);
        self.pending.borrow_mut().take();
    }

    fn bind_handlers(&mut self, surface: &mut dyn MapSurface) {
        let cursor = surface.cursor();

        for layer_id in self.ids.interactive() {
            let callback = self.on_cell_pressed.clone();
            let last_click = Rc::clone(&self.last_click);
            self.registry.bind(
                surface,
                MapEventKind::Click,
                layer_id,
                Rc::new(move |event: &LayerEvent| {
                    let Some(callback) = &callback else {
                        return;
                    };
                    // Hotspots are drawn over points, so one click reaches both.
                    if last_click.replace(Some(event.pointer_id)) == Some(event.pointer_id) {
                        return;
                    }
                    if let Some(feature) = event.nearest_feature() {
                        callback(CellPressed::from_properties(
                            feature.coordinate,
                            &feature.properties,
                        ));
                    }
                }),
            );

            let enter = Rc::clone(&cursor);
            self.registry.bind(
                surface,
                MapEventKind::MouseEnter,
                layer_id,
                Rc::new(move |_: &LayerEvent| enter.set(Cursor::Pointer)),
            );

            let leave = Rc::clone(&cursor);
            self.registry.bind(
                surface,
                MapEventKind::MouseLeave,
                layer_id,
                Rc::new(move |_: &LayerEvent| leave.set(Cursor::Default)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MapLayerState;
    use crate::surface::SurfaceOp;
    use serde_json::Map;
    use wildfire_map_risk_models::{BoundingBox, Coordinate, Rgba};

    fn point(lon: f64, lat: f64, risk: f64) -> EnrichedPoint {
        EnrichedPoint {
            coordinate: Coordinate::new(lon, lat),
            risk: Some(risk),
            temperature: Some(31.0),
            relative_humidity: Some(18.0),
            wind_speed: Some(7.5),
            wind_direction_deg: Some(45.0),
            color: Rgba::new(255, 0, 0, 0.9),
            is_hotspot: risk >= 0.75,
            district: Some("Kadıköy".to_string()),
            region: None,
            city_name: Some("İstanbul".to_string()),
            city_label: Some("İstanbul / Kadıköy".to_string()),
            aoi_id: "ist".to_string(),
            aoi_name: Some("İstanbul".to_string()),
            extra: Map::new(),
        }
    }

    fn cells() -> Vec<EnrichedPoint> {
        vec![point(29.03, 40.99, 0.9), point(29.2, 41.1, 0.3)]
    }

    fn loaded_state() -> MapLayerState {
        let mut state = MapLayerState::new(BoundingBox::new(28.0, 40.7, 29.8, 41.6));
        state.finish_style_load();
        state
    }

    fn count_ops(ops: &[SurfaceOp], pred: impl Fn(&SurfaceOp) -> bool) -> usize {
        ops.iter().filter(|op| pred(op)).count()
    }

    #[test]
    fn skips_without_surface() {
        let mut engine = LayerSyncEngine::default();
        let outcome = engine
            .sync(None, &cells(), DisplayConfig::default())
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Skipped);
    }

    #[test]
    fn first_sync_creates_source_and_layers() {
        let mut state = loaded_state();
        let mut engine = LayerSyncEngine::default();

        let outcome = engine
            .sync(Some(&mut state), &cells(), DisplayConfig::default())
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Applied);
        assert_eq!(state.source("risk-src").unwrap().features.len(), 2);
        assert_eq!(
            state.layer_ids(),
            ["risk-heatmap", "risk-points", "risk-hotspots"]
        );
        assert_eq!(
            state.layer("risk-heatmap").unwrap().paint.get("heatmap-weight"),
            Some(&json!(["get", "risk"]))
        );
        assert_eq!(state.layer("risk-heatmap").unwrap().maxzoom, Some(14.0));
        assert_eq!(
            state.layer("risk-points").unwrap().paint.get("circle-color"),
            Some(&json!(["get", "color"]))
        );
        assert_eq!(
            state.layer("risk-hotspots").unwrap().filter,
            Some(json!([">=", ["get", "risk"], 0.75]))
        );
    }

    #[test]
    fn repeated_sync_updates_in_place_with_single_handlers() {
        let mut state = loaded_state();
        let mut engine = LayerSyncEngine::default();
        let clicks = Rc::new(Cell::new(0));
        let counter = Rc::clone(&clicks);
        engine.set_on_cell_pressed(Rc::new(move |_: CellPressed| counter.set(counter.get() + 1)));

        let config = DisplayConfig::default();
        engine.sync(Some(&mut state), &cells(), config).unwrap();
        state.take_journal();
        engine.sync(Some(&mut state), &cells(), config).unwrap();

        let ops = state.take_journal();
        assert_eq!(count_ops(&ops, |op| matches!(op, SurfaceOp::AddSource { .. })), 0);
        assert_eq!(count_ops(&ops, |op| matches!(op, SurfaceOp::AddLayer { .. })), 0);
        assert_eq!(count_ops(&ops, |op| matches!(op, SurfaceOp::SetSourceData { .. })), 1);
        assert_eq!(count_ops(&ops, |op| matches!(op, SurfaceOp::SetPaintProperty { .. })), 2);
        assert_eq!(count_ops(&ops, |op| matches!(op, SurfaceOp::SetFilter { .. })), 1);

        for layer in ["risk-points", "risk-hotspots"] {
            for kind in [MapEventKind::Click, MapEventKind::MouseEnter, MapEventKind::MouseLeave] {
                assert_eq!(state.handler_count(kind, layer), 1);
            }
        }

        assert_eq!(state.click("risk-points", Coordinate::new(29.03, 40.99), 0.01), 1);
        assert_eq!(clicks.get(), 1);
    }

    #[test]
    fn click_emits_normalized_cell() {
        let mut state = loaded_state();
        let mut engine = LayerSyncEngine::default();
        let pressed = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&pressed);
        engine.set_on_cell_pressed(Rc::new(move |cell: CellPressed| {
            *sink.borrow_mut() = Some(cell);
        }));

        engine
            .sync(Some(&mut state), &cells(), DisplayConfig::default())
            .unwrap();
        state.click("risk-hotspots", Coordinate::new(29.031, 40.99), 0.01);

        let cell = pressed.borrow().clone().unwrap();
        assert_eq!(cell.risk, Some(0.9));
        assert_eq!(cell.wind_direction_deg, Some(45.0));
        assert_eq!(cell.district.as_deref(), Some("Kadıköy"));
        assert_eq!(cell.coord, Coordinate::new(29.03, 40.99));
    }

    #[test]
    fn threshold_change_only_touches_filter() {
        let mut state = loaded_state();
        let mut engine = LayerSyncEngine::default();
        engine
            .sync(Some(&mut state), &cells(), DisplayConfig::default())
            .unwrap();

        let lowered = DisplayConfig {
            hot_threshold: 0.2,
            ..DisplayConfig::default()
        };
        engine.sync(Some(&mut state), &cells(), lowered).unwrap();

        assert_eq!(
            state.layer("risk-hotspots").unwrap().filter,
            Some(hotspot_filter(0.2))
        );
        assert_eq!(state.click("risk-hotspots", Coordinate::new(29.2, 41.1), 0.01), 1);
    }

    #[test]
    fn opacity_change_only_touches_paint() {
        let mut state = loaded_state();
        let mut engine = LayerSyncEngine::default();
        engine
            .sync(Some(&mut state), &cells(), DisplayConfig::default())
            .unwrap();
        state.take_journal();

        let faded = DisplayConfig {
            opacity: 0.3,
            ..DisplayConfig::default()
        };
        engine.sync(Some(&mut state), &cells(), faded).unwrap();

        let ops = state.take_journal();
        assert_eq!(count_ops(&ops, |op| matches!(op, SurfaceOp::AddLayer { .. })), 0);
        assert!(ops.iter().any(|op| matches!(
            op,
            SurfaceOp::SetPaintProperty { layer_id, name, value }
                if layer_id == "risk-heatmap" && name == "heatmap-opacity" && *value == json!(0.3)
        )));
        assert_eq!(
            state.layer("risk-heatmap").unwrap().paint.get("heatmap-opacity"),
            Some(&json!(0.3))
        );
        assert_eq!(
            state.layer("risk-points").unwrap().paint.get("circle-opacity"),
            Some(&json!(0.3))
        );
    }

    #[test]
    fn one_click_over_stacked_layers_emits_one_cell() {
        let mut state = loaded_state();
        let mut engine = LayerSyncEngine::default();
        let pressed = Rc::new(Cell::new(0));
        let counter = Rc::clone(&pressed);
        engine.set_on_cell_pressed(Rc::new(move |_: CellPressed| counter.set(counter.get() + 1)));
        engine
            .sync(Some(&mut state), &cells()[..1], DisplayConfig::default())
            .unwrap();

        let handlers = state.click_at(Coordinate::new(29.03, 40.99), 0.01);
        assert_eq!(handlers, 2);
        assert_eq!(pressed.get(), 1);

        state.click_at(Coordinate::new(29.03, 40.99), 0.01);
        assert_eq!(pressed.get(), 2);
    }

    #[test]
    fn defers_until_style_loads_and_applies_latest() {
        let mut state = MapLayerState::new(BoundingBox::new(28.0, 40.7, 29.8, 41.6));
        let mut engine = LayerSyncEngine::default();

        let first = engine
            .sync(Some(&mut state), &cells(), DisplayConfig::default())
            .unwrap();
        let second = engine
            .sync(
                Some(&mut state),
                &cells()[..1],
                DisplayConfig {
                    opacity: 0.4,
                    hot_threshold: 0.5,
                },
            )
            .unwrap();

        assert_eq!(first, SyncOutcome::Deferred);
        assert_eq!(second, SyncOutcome::Deferred);
        assert!(engine.has_pending());
        assert!(state.source("risk-src").is_none());

        state.finish_style_load();

        assert!(!engine.has_pending());
        assert_eq!(state.source("risk-src").unwrap().features.len(), 1);
        assert_eq!(
            state.layer("risk-points").unwrap().paint.get("circle-opacity"),
            Some(&json!(0.4))
        );
        let adds = count_ops(state.journal(), |op| matches!(op, SurfaceOp::AddSource { .. }));
        assert_eq!(adds, 1);
    }

    #[test]
    fn hover_toggles_cursor() {
        let mut state = loaded_state();
        let mut engine = LayerSyncEngine::default();
        engine
            .sync(Some(&mut state), &cells(), DisplayConfig::default())
            .unwrap();

        state.hover("risk-points", Coordinate::new(29.03, 40.99), true);
        assert_eq!(state.current_cursor(), Cursor::Pointer);
        state.hover("risk-points", Coordinate::new(29.03, 40.99), false);
        assert_eq!(state.current_cursor(), Cursor::Default);
    }

    #[test]
    fn dispose_unbinds_handlers() {
        let mut state = loaded_state();
        let mut engine = LayerSyncEngine::default();
        engine
            .sync(Some(&mut state), &cells(), DisplayConfig::default())
            .unwrap();
        engine.dispose(&mut state);
        assert_eq!(state.handler_count(MapEventKind::Click, "risk-points"), 0);
    }
}
