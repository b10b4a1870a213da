//! In-memory [`MapSurface`] implementation.
//!
//! [`MapLayerState`] owns the sources, layers, images and handlers of a
//! single map instance and journals every mutation as a [`SurfaceOp`].
//! It is created once per map and dropped when the map is disposed.
//! Pointer interaction is simulated with [`MapLayerState::click_at`],
//! [`MapLayerState::click`] and [`MapLayerState::hover`], which hit-test
//! layer source data against the layer filter the same way a renderer
//! would.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use geojson::FeatureCollection;
use serde::Serialize;
use serde_json::Value;
use wildfire_map_risk_models::{BoundingBox, Coordinate};

use crate::SurfaceError;
use crate::expression::matches_filter;
use crate::surface::{
    Cursor, CursorHandle, Handler, HandlerId, ImageResource, LayerEvent, LayerSpec, MapEventKind,
    MapSurface, RenderedFeature, StyleReadyTask, SurfaceOp,
};

struct BoundHandler {
    id: HandlerId,
    kind: MapEventKind,
    layer_id: String,
    handler: Handler,
}

/// The mutable rendering surface of one map instance.
pub struct MapLayerState {
    sources: BTreeMap<String, FeatureCollection>,
    layers: BTreeMap<String, LayerSpec>,
    /// Layer ids in draw order.
    layer_order: Vec<String>,
    images: BTreeMap<String, ImageResource>,
    handlers: Vec<BoundHandler>,
    next_handler: u64,
    next_pointer: Cell<u64>,
    style_loaded: bool,
    style_waiters: Vec<StyleReadyTask>,
    cursor: CursorHandle,
    bounds: BoundingBox,
    journal: Vec<SurfaceOp>,
}

/// Serializable view of the surface for inspection.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceSnapshot<'a> {
    pub sources: BTreeMap<&'a str, usize>,
    pub layers: Vec<&'a LayerSpec>,
    pub images: Vec<&'a str>,
    pub handlers: Vec<(MapEventKind, &'a str, HandlerId)>,
    pub cursor: Cursor,
    pub bounds: BoundingBox,
}

impl MapLayerState {
    /// Creates an empty surface whose style is still loading.
    #[must_use]
    pub fn new(bounds: BoundingBox) -> Self {
        Self {
            sources: BTreeMap::new(),
            layers: BTreeMap::new(),
            layer_order: Vec::new(),
            images: BTreeMap::new(),
            handlers: Vec::new(),
            next_handler: 1,
            next_pointer: Cell::new(1),
            style_loaded: false,
            style_waiters: Vec::new(),
            cursor: Rc::new(Cell::new(Cursor::Default)),
            bounds,
            journal: Vec::new(),
        }
    }

    /// Marks the style as loaded and runs every deferred task once.
    pub fn finish_style_load(&mut self) {
        if self.style_loaded {
            return;
        }
        self.style_loaded = true;

        let waiters = std::mem::take(&mut self.style_waiters);
        log::debug!("Style loaded, running {} deferred task(s)", waiters.len());
        for task in waiters {
            task(self);
        }
    }

    /// Moves the visible extent.
    pub const fn set_bounds(&mut self, bounds: BoundingBox) {
        self.bounds = bounds;
    }

    #[must_use]
    pub fn source(&self, id: &str) -> Option<&FeatureCollection> {
        self.sources.get(id)
    }

    #[must_use]
    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.get(id)
    }

    /// Layer ids in draw order.
    #[must_use]
    pub fn layer_ids(&self) -> &[String] {
        &self.layer_order
    }

    /// Number of handlers bound to `(kind, layer_id)`.
    #[must_use]
    pub fn handler_count(&self, kind: MapEventKind, layer_id: &str) -> usize {
        self.handlers
            .iter()
            .filter(|h| h.kind == kind && h.layer_id == layer_id)
            .count()
    }

    /// Every recorded mutation, oldest first.
    #[must_use]
    pub fn journal(&self) -> &[SurfaceOp] {
        &self.journal
    }

    /// Drains the journal.
    pub fn take_journal(&mut self) -> Vec<SurfaceOp> {
        std::mem::take(&mut self.journal)
    }

    /// Current cursor.
    #[must_use]
    pub fn current_cursor(&self) -> Cursor {
        self.cursor.get()
    }

    #[must_use]
    pub fn snapshot(&self) -> SurfaceSnapshot<'_> {
        SurfaceSnapshot {
            sources: self
                .sources
                .iter()
                .map(|(id, data)| (id.as_str(), data.features.len()))
                .collect(),
            layers: self
                .layer_order
                .iter()
                .filter_map(|id| self.layers.get(id))
                .collect(),
            images: self.images.keys().map(String::as_str).collect(),
            handlers: self
                .handlers
                .iter()
                .map(|h| (h.kind, h.layer_id.as_str(), h.id))
                .collect(),
            cursor: self.cursor.get(),
            bounds: self.bounds,
        }
    }

    /// Features of `layer_id` within `radius` degrees of `pointer`,
    /// nearest first.
    #[must_use]
    pub fn query_rendered_features(
        &self,
        layer_id: &str,
        pointer: Coordinate,
        radius: f64,
    ) -> Vec<RenderedFeature> {
        let Some(layer) = self.layers.get(layer_id) else {
            return Vec::new();
        };
        let Some(source) = self.sources.get(&layer.source) else {
            return Vec::new();
        };

        let radius_sq = radius * radius;
        let mut hits: Vec<RenderedFeature> = source
            .features
            .iter()
            .filter_map(RenderedFeature::from_geojson)
            .filter(|f| f.coordinate.distance_sq(&pointer) <= radius_sq)
            .filter(|f| matches_filter(layer.filter.as_ref(), &f.properties))
            .collect();

        hits.sort_by(|a, b| {
            a.coordinate
                .distance_sq(&pointer)
                .total_cmp(&b.coordinate.distance_sq(&pointer))
        });
        hits
    }

    /// Delivers an event to every handler bound for its kind and layer.
    /// Returns the number of handlers invoked.
    pub fn dispatch(&self, event: &LayerEvent) -> usize {
        let targets: Vec<Handler> = self
            .handlers
            .iter()
            .filter(|h| h.kind == event.kind && h.layer_id == event.layer_id)
            .map(|h| Rc::clone(&h.handler))
            .collect();

        for handler in &targets {
            handler(event);
        }
        targets.len()
    }

    /// Simulates one click at `pointer` on the whole map.
    ///
    /// Like a renderer, the click is delivered to every layer that has a
    /// feature within `radius`, in draw order, and every delivery shares
    /// one [`LayerEvent::pointer_id`]. Returns the number of handlers
    /// invoked.
    pub fn click_at(&self, pointer: Coordinate, radius: f64) -> usize {
        let pointer_id = self.next_pointer_id();
        self.layer_order
            .iter()
            .map(|layer_id| self.deliver_click(layer_id, pointer, radius, pointer_id))
            .sum()
    }

    /// Simulates a click at `pointer` on `layer_id` only.
    ///
    /// Nothing fires when no feature of the layer lies within `radius`.
    /// Returns the number of handlers invoked.
    pub fn click(&self, layer_id: &str, pointer: Coordinate, radius: f64) -> usize {
        let pointer_id = self.next_pointer_id();
        self.deliver_click(layer_id, pointer, radius, pointer_id)
    }

    /// Simulates the pointer entering or leaving `layer_id`.
    pub fn hover(&self, layer_id: &str, pointer: Coordinate, entering: bool) -> usize {
        let kind = if entering {
            MapEventKind::MouseEnter
        } else {
            MapEventKind::MouseLeave
        };
        self.dispatch(&LayerEvent {
            kind,
            layer_id: layer_id.to_string(),
            pointer_id: self.next_pointer_id(),
            pointer,
            features: Vec::new(),
        })
    }

    fn deliver_click(
        &self,
        layer_id: &str,
        pointer: Coordinate,
        radius: f64,
        pointer_id: u64,
    ) -> usize {
        let features = self.query_rendered_features(layer_id, pointer, radius);
        if features.is_empty() {
            return 0;
        }
        self.dispatch(&LayerEvent {
            kind: MapEventKind::Click,
            layer_id: layer_id.to_string(),
            pointer_id,
            pointer,
            features,
        })
    }

    fn next_pointer_id(&self) -> u64 {
        let id = self.next_pointer.get();
        self.next_pointer.set(id + 1);
        id
    }

    fn require_layer(&mut self, layer_id: &str) -> Result<&mut LayerSpec, SurfaceError> {
        self.layers
            .get_mut(layer_id)
            .ok_or_else(|| SurfaceError::UnknownLayer(layer_id.to_string()))
    }
}

impl MapSurface for MapLayerState {
    fn is_style_loaded(&self) -> bool {
        self.style_loaded
    }

    fn once_style_ready(&mut self, task: StyleReadyTask) {
        if self.style_loaded {
            task(self);
        } else {
            self.style_waiters.push(task);
        }
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn add_source(&mut self, id: &str, data: FeatureCollection) -> Result<(), SurfaceError> {
        if self.sources.contains_key(id) {
            return Err(SurfaceError::DuplicateSource(id.to_string()));
        }
        self.journal.push(SurfaceOp::AddSource {
            id: id.to_string(),
            features: data.features.len(),
        });
        self.sources.insert(id.to_string(), data);
        Ok(())
    }

    fn set_source_data(&mut self, id: &str, data: FeatureCollection) -> Result<(), SurfaceError> {
        let slot = self
            .sources
            .get_mut(id)
            .ok_or_else(|| SurfaceError::UnknownSource(id.to_string()))?;
        let features = data.features.len();
        *slot = data;
        self.journal.push(SurfaceOp::SetSourceData {
            id: id.to_string(),
            features,
        });
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.contains_key(id)
    }

    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), SurfaceError> {
        if self.layers.contains_key(&layer.id) {
            return Err(SurfaceError::DuplicateLayer(layer.id));
        }
        if !self.sources.contains_key(&layer.source) {
            return Err(SurfaceError::UnknownSource(layer.source));
        }
        self.journal.push(SurfaceOp::AddLayer {
            layer: layer.clone(),
        });
        self.layer_order.push(layer.id.clone());
        self.layers.insert(layer.id.clone(), layer);
        Ok(())
    }

    fn set_paint_property(
        &mut self,
        layer_id: &str,
        name: &str,
        value: Value,
    ) -> Result<(), SurfaceError> {
        let layer = self.require_layer(layer_id)?;
        layer.paint.insert(name.to_string(), value.clone());
        self.journal.push(SurfaceOp::SetPaintProperty {
            layer_id: layer_id.to_string(),
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    fn set_filter(&mut self, layer_id: &str, filter: Option<Value>) -> Result<(), SurfaceError> {
        let layer = self.require_layer(layer_id)?;
        layer.filter.clone_from(&filter);
        self.journal.push(SurfaceOp::SetFilter {
            layer_id: layer_id.to_string(),
            filter,
        });
        Ok(())
    }

    fn has_image(&self, id: &str) -> bool {
        self.images.contains_key(id)
    }

    fn add_image(&mut self, id: &str, image: ImageResource) -> Result<(), SurfaceError> {
        if self.images.contains_key(id) {
            return Err(SurfaceError::DuplicateImage(id.to_string()));
        }
        self.images.insert(id.to_string(), image);
        self.journal.push(SurfaceOp::AddImage { id: id.to_string() });
        Ok(())
    }

    fn on(&mut self, kind: MapEventKind, layer_id: &str, handler: Handler) -> HandlerId {
        let id = HandlerId(self.next_handler);
        self.next_handler += 1;
        self.handlers.push(BoundHandler {
            id,
            kind,
            layer_id: layer_id.to_string(),
            handler,
        });
        self.journal.push(SurfaceOp::Bind {
            event: kind,
            layer_id: layer_id.to_string(),
            handler: id,
        });
        id
    }

    fn off(&mut self, kind: MapEventKind, layer_id: &str, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers
            .retain(|h| !(h.id == id && h.kind == kind && h.layer_id == layer_id));
        let removed = self.handlers.len() != before;
        if removed {
            self.journal.push(SurfaceOp::Unbind {
                event: kind,
                layer_id: layer_id.to_string(),
                handler: id,
            });
        }
        removed
    }

    fn cursor(&self) -> CursorHandle {
        Rc::clone(&self.cursor)
    }

    fn bounds(&self) -> BoundingBox {
        self.bounds
    }
}
