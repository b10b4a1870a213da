//! The stateful map rendering surface the layer engine drives.
//!
//! [`MapSurface`] mirrors the subset of a `MapLibre`-style map API the
//! engine needs: named `GeoJSON` sources, styled layers, registered
//! images, per-layer event handlers and a one-shot "style ready" signal.
//! Every mutation is also describable as a [`SurfaceOp`], which is what
//! the in-memory [`crate::state::MapLayerState`] records.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use geojson::FeatureCollection;
use serde::Serialize;
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, Display, EnumString};
use wildfire_map_risk_models::{BoundingBox, Coordinate};

use crate::SurfaceError;

/// Pointer events that can be bound per layer.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MapEventKind {
    Click,
    MouseEnter,
    MouseLeave,
}

/// Opaque handle returned when binding a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct HandlerId(pub u64);

/// A feature under the pointer, as reported by the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFeature {
    pub coordinate: Coordinate,
    pub properties: Map<String, Value>,
}

impl RenderedFeature {
    /// Extracts a rendered feature from a `GeoJSON` point feature.
    #[must_use]
    pub fn from_geojson(feature: &geojson::Feature) -> Option<Self> {
        let geojson::Value::Point(position) = &feature.geometry.as_ref()?.value else {
            return None;
        };
        Some(Self {
            coordinate: Coordinate::new(*position.first()?, *position.get(1)?),
            properties: feature.properties.clone().unwrap_or_default(),
        })
    }
}

/// A pointer event delivered to layer handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerEvent {
    pub kind: MapEventKind,
    pub layer_id: String,
    /// Shared by every delivery of the same pointer action, so a click
    /// over several stacked layers carries one id.
    pub pointer_id: u64,
    /// Geographic position of the pointer.
    pub pointer: Coordinate,
    /// Features of `layer_id` under the pointer.
    pub features: Vec<RenderedFeature>,
}

impl LayerEvent {
    /// The feature closest to the pointer, if any.
    #[must_use]
    pub fn nearest_feature(&self) -> Option<&RenderedFeature> {
        self.features.iter().min_by(|a, b| {
            a.coordinate
                .distance_sq(&self.pointer)
                .total_cmp(&b.coordinate.distance_sq(&self.pointer))
        })
    }
}

/// Callback bound to a `(event, layer)` pair.
pub type Handler = Rc<dyn Fn(&LayerEvent)>;

/// Work deferred until the surface style has loaded.
pub type StyleReadyTask = Box<dyn FnOnce(&mut dyn MapSurface)>;

/// Pointer cursor shown over the map canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Cursor {
    #[default]
    Default,
    Pointer,
}

/// Shared cursor cell handlers can update without borrowing the surface.
pub type CursorHandle = Rc<Cell<Cursor>>;

/// Layer render type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LayerKind {
    Circle,
    Symbol,
    Heatmap,
}

/// Declarative layer definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub source: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub paint: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub layout: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    /// Zoom level above which the layer is hidden.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxzoom: Option<f64>,
}

impl LayerSpec {
    #[must_use]
    pub fn new(id: &str, kind: LayerKind, source: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            source: source.to_string(),
            paint: BTreeMap::new(),
            layout: BTreeMap::new(),
            filter: None,
            maxzoom: None,
        }
    }

    #[must_use]
    pub fn paint(mut self, name: &str, value: Value) -> Self {
        self.paint.insert(name.to_string(), value);
        self
    }

    #[must_use]
    pub fn layout(mut self, name: &str, value: Value) -> Self {
        self.layout.insert(name.to_string(), value);
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub const fn maxzoom(mut self, zoom: f64) -> Self {
        self.maxzoom = Some(zoom);
        self
    }
}

/// A raster or vector image registered for symbol layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResource {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// One mutation of the rendering surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum SurfaceOp {
    AddSource {
        id: String,
        features: usize,
    },
    SetSourceData {
        id: String,
        features: usize,
    },
    AddLayer {
        layer: LayerSpec,
    },
    #[serde(rename_all = "camelCase")]
    SetPaintProperty {
        layer_id: String,
        name: String,
        value: Value,
    },
    #[serde(rename_all = "camelCase")]
    SetFilter {
        layer_id: String,
        filter: Option<Value>,
    },
    AddImage {
        id: String,
    },
    #[serde(rename_all = "camelCase")]
    Bind {
        event: MapEventKind,
        layer_id: String,
        handler: HandlerId,
    },
    #[serde(rename_all = "camelCase")]
    Unbind {
        event: MapEventKind,
        layer_id: String,
        handler: HandlerId,
    },
}

/// A mutable map rendering surface.
///
/// Sources and layers are created once and then updated in place;
/// there is no removal. Implementations may allow several handlers per
/// `(event, layer)` pair; keeping that at one is the caller's job.
pub trait MapSurface {
    /// Whether the style has finished loading.
    fn is_style_loaded(&self) -> bool;

    /// Runs `task` once when the style finishes loading.
    fn once_style_ready(&mut self, task: StyleReadyTask);

    fn has_source(&self, id: &str) -> bool;

    /// # Errors
    ///
    /// Returns [`SurfaceError::DuplicateSource`] if `id` already exists.
    fn add_source(&mut self, id: &str, data: FeatureCollection) -> Result<(), SurfaceError>;

    /// Replaces a source's data in place.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::UnknownSource`] if `id` does not exist.
    fn set_source_data(&mut self, id: &str, data: FeatureCollection) -> Result<(), SurfaceError>;

    fn has_layer(&self, id: &str) -> bool;

    /// # Errors
    ///
    /// Returns [`SurfaceError::DuplicateLayer`] if the layer exists, or
    /// [`SurfaceError::UnknownSource`] if its source does not.
    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), SurfaceError>;

    /// # Errors
    ///
    /// Returns [`SurfaceError::UnknownLayer`] if the layer does not exist.
    fn set_paint_property(
        &mut self,
        layer_id: &str,
        name: &str,
        value: Value,
    ) -> Result<(), SurfaceError>;

    /// # Errors
    ///
    /// Returns [`SurfaceError::UnknownLayer`] if the layer does not exist.
    fn set_filter(&mut self, layer_id: &str, filter: Option<Value>) -> Result<(), SurfaceError>;

    fn has_image(&self, id: &str) -> bool;

    /// # Errors
    ///
    /// Returns [`SurfaceError::DuplicateImage`] if `id` is registered.
    fn add_image(&mut self, id: &str, image: ImageResource) -> Result<(), SurfaceError>;

    /// Binds `handler` to `kind` events on `layer_id`.
    fn on(&mut self, kind: MapEventKind, layer_id: &str, handler: Handler) -> HandlerId;

    /// Unbinds a handler. Returns whether it was bound.
    fn off(&mut self, kind: MapEventKind, layer_id: &str, id: HandlerId) -> bool;

    /// Shared cursor state.
    fn cursor(&self) -> CursorHandle;

    /// Currently visible extent.
    fn bounds(&self) -> BoundingBox;
}
