//! Keeps at most one bound handler per `(event, layer)` pair.

use std::collections::BTreeMap;

use crate::surface::{Handler, HandlerId, MapEventKind, MapSurface};

/// Tracks the handlers a component has bound on a surface.
///
/// Binding through the registry always unbinds the previous handler for
/// the same pair first, so repeated binding never accumulates handlers.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    bound: BTreeMap<(MapEventKind, String), HandlerId>,
}

impl HandlerRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bound: BTreeMap::new(),
        }
    }

    /// Replaces the handler for `(kind, layer_id)`.
    pub fn bind(
        &mut self,
        surface: &mut dyn MapSurface,
        kind: MapEventKind,
        layer_id: &str,
        handler: Handler,
    ) -> HandlerId {
        if let Some(previous) = self.bound.remove(&(kind, layer_id.to_string())) {
            surface.off(kind, layer_id, previous);
        }
        let id = surface.on(kind, layer_id, handler);
        self.bound.insert((kind, layer_id.to_string()), id);
        id
    }

    /// Unbinds every handler this registry bound.
    pub fn unbind_all(&mut self, surface: &mut dyn MapSurface) {
        for ((kind, layer_id), id) in std::mem::take(&mut self.bound) {
            surface.off(kind, &layer_id, id);
        }
    }

    #[must_use]
    pub fn get(&self, kind: MapEventKind, layer_id: &str) -> Option<HandlerId> {
        self.bound.get(&(kind, layer_id.to_string())).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bound.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}
