//! Reports the visible extent once the map stops moving.

use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use wildfire_map_risk_models::BoundingBox;

use crate::surface::MapSurface;

/// Camera lifecycle events emitted by a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ViewportEvent {
    /// Initial style and tiles finished loading.
    Load,
    /// Intermediate camera frame during a pan or zoom.
    Move,
    /// A pan or zoom settled.
    MoveEnd,
}

type SettledCallback = Box<dyn FnMut(BoundingBox)>;

/// Debounces camera events down to "viewport settled" notifications.
///
/// The callback fires once for the initial load and after every
/// `MoveEnd`. Intermediate `Move` frames are ignored.
#[derive(Default)]
pub struct ViewportTracker {
    callbacks: Vec<SettledCallback>,
    loaded: bool,
    last: Option<BoundingBox>,
}

impl ViewportTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for settled viewports.
    pub fn on_viewport_settled(&mut self, callback: impl FnMut(BoundingBox) + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    /// Feeds a camera event. Returns the reported extent, if any.
    pub fn handle(
        &mut self,
        event: ViewportEvent,
        surface: &dyn MapSurface,
    ) -> Option<BoundingBox> {
        match event {
            ViewportEvent::Move => return None,
            ViewportEvent::Load if self.loaded => return None,
            ViewportEvent::Load => self.loaded = true,
            ViewportEvent::MoveEnd => {}
        }

        let bounds = surface.bounds();
        log::debug!(
            "Viewport settled ({event}): [{}, {}, {}, {}]",
            bounds.min_lon,
            bounds.min_lat,
            bounds.max_lon,
            bounds.max_lat
        );
        self.last = Some(bounds);
        for callback in &mut self.callbacks {
            callback(bounds);
        }
        Some(bounds)
    }

    /// The most recently reported extent.
    #[must_use]
    pub const fn last(&self) -> Option<BoundingBox> {
        self.last
    }
}
