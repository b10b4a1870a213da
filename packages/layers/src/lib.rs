#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Map surface model and risk layer synchronization.
//!
//! The [`surface::MapSurface`] trait is the only way layers touch the map.
//! [`sync::LayerSyncEngine`] turns enriched risk cells into an idempotent
//! series of create-or-update operations on it, [`markers::MarkerLayer`]
//! does the same for fire-station markers behind an async image gate, and
//! [`viewport::ViewportTracker`] reports settled map extents.

pub mod expression;
pub mod markers;
pub mod registry;
pub mod state;
pub mod surface;
pub mod sync;
pub mod viewport;

pub use markers::{ImageLoader, Marker, MarkerLayer, StaticImageLoader};
pub use registry::HandlerRegistry;
pub use state::MapLayerState;
pub use surface::{MapEventKind, MapSurface, SurfaceOp};
pub use sync::{CellCallback, LayerIds, LayerSyncEngine, SyncOutcome};
pub use viewport::{ViewportEvent, ViewportTracker};

/// Errors raised by a [`MapSurface`].
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("Source already exists: {0}")]
    DuplicateSource(String),
    #[error("Unknown source: {0}")]
    UnknownSource(String),
    #[error("Layer already exists: {0}")]
    DuplicateLayer(String),
    #[error("Unknown layer: {0}")]
    UnknownLayer(String),
    #[error("Image already registered: {0}")]
    DuplicateImage(String),
    #[error("Failed to load image {id}: {reason}")]
    ImageLoad { id: String, reason: String },
}
