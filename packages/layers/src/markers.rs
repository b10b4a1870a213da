//! Fire-station marker layer.
//!
//! Symbol layers reference their icon by id, so the icon image has to be
//! registered on the surface before the layer is created. Loading the
//! image is asynchronous; [`MarkerLayer::sync`] awaits it and only then
//! runs the usual create-or-update of source and layer.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use wildfire_map_risk_models::Coordinate;

use crate::SurfaceError;
use crate::surface::{ImageResource, LayerKind, LayerSpec, MapSurface};
use crate::sync::SyncOutcome;

pub const FIRE_STATION_IMAGE: &str = "fire-station";

const FIRE_STATION_SVG: &str = concat!(
    r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24" width="32" height="32">"##,
    r##"<path fill="#dc2626" d="M12 1.5c1.8 2.9 5.5 4.6 5.5 9.1a5.5 5.5 0 0 1-11 0"##,
    r##"c0-2.4 1.2-4.1 2.9-5.6.2 2.2 1.4 3.6 2.6 3.6 1.5 0 1.9-1.4 1.2-3.3"##,
    r##"-.5-1.4-1.2-2.5-1.2-3.8z"/>"##,
    r##"<rect fill="#ffffff" x="10.5" y="13" width="3" height="6" rx="0.5"/>"##,
    "</svg>"
);

/// Supplies icon images by id.
#[async_trait(?Send)]
pub trait ImageLoader {
    /// # Errors
    ///
    /// * If the image cannot be produced
    async fn load(&self, id: &str) -> Result<ImageResource, SurfaceError>;
}

/// Loader for the icons bundled with the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticImageLoader;

#[async_trait(?Send)]
impl ImageLoader for StaticImageLoader {
    async fn load(&self, id: &str) -> Result<ImageResource, SurfaceError> {
        match id {
            FIRE_STATION_IMAGE => Ok(ImageResource {
                width: 32,
                height: 32,
                pixel_ratio: 2.0,
                bytes: FIRE_STATION_SVG.as_bytes().to_vec(),
            }),
            _ => Err(SurfaceError::ImageLoad {
                id: id.to_string(),
                reason: "no bundled image with this id".to_string(),
            }),
        }
    }
}

/// A single map marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: String,
    pub coord: Coordinate,
}

fn markers_collection(markers: &[Marker]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: markers
            .iter()
            .map(|marker| {
                let mut properties = Map::new();
                properties.insert("id".to_string(), Value::String(marker.id.clone()));
                geojson::Feature {
                    bbox: None,
                    geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![
                        marker.coord.lon,
                        marker.coord.lat,
                    ]))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect(),
        foreign_members: None,
    }
}

struct MarkerPlan {
    source_id: String,
    layer_id: String,
    image_id: String,
    data: FeatureCollection,
}

impl MarkerPlan {
    fn apply(self, surface: &mut dyn MapSurface) -> Result<(), SurfaceError> {
        if surface.has_source(&self.source_id) {
            surface.set_source_data(&self.source_id, self.data)?;
        } else {
            surface.add_source(&self.source_id, self.data)?;
        }

        if !surface.has_layer(&self.layer_id) {
            surface.add_layer(
                LayerSpec::new(&self.layer_id, LayerKind::Symbol, &self.source_id)
                    .layout("icon-image", json!(self.image_id))
                    .layout("icon-size", json!(1))
                    .layout("icon-allow-overlap", json!(true)),
            )?;
        }

        Ok(())
    }
}

/// Keeps the marker source and symbol layer in sync.
pub struct MarkerLayer {
    source_id: String,
    layer_id: String,
    image_id: String,
    pending: Rc<RefCell<Option<MarkerPlan>>>,
}

impl Default for MarkerLayer {
    fn default() -> Self {
        Self::new("custom-markers-src", "custom-markers-layer", FIRE_STATION_IMAGE)
    }
}

impl MarkerLayer {
    #[must_use]
    pub fn new(source_id: &str, layer_id: &str, image_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            layer_id: layer_id.to_string(),
            image_id: image_id.to_string(),
            pending: Rc::new(RefCell::new(None)),
        }
    }

    #[must_use]
    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    /// Ensures the icon is registered, then creates or updates the
    /// marker source and layer.
    ///
    /// # Errors
    ///
    /// * If `loader` fails to produce the icon
    /// * If the surface rejects an operation
    pub async fn sync(
        &self,
        surface: Option<&mut dyn MapSurface>,
        markers: &[Marker],
        loader: &dyn ImageLoader,
    ) -> Result<SyncOutcome, SurfaceError> {
        let Some(surface) = surface else {
            return Ok(SyncOutcome::Skipped);
        };

        if !surface.has_image(&self.image_id) {
            let image = loader.load(&self.image_id).await?;
            // Another sync may have registered it while this one waited.
            if !surface.has_image(&self.image_id) {
                surface.add_image(&self.image_id, image)?;
            }
        }

        let plan = MarkerPlan {
            source_id: self.source_id.clone(),
            layer_id: self.layer_id.clone(),
            image_id: self.image_id.clone(),
            data: markers_collection(markers),
        };

        if surface.is_style_loaded() {
            self.pending.borrow_mut().take();
            plan.apply(surface)?;
            return Ok(SyncOutcome::Applied);
        }

        if self.pending.borrow_mut().replace(plan).is_none() {
            let pending = Rc::clone(&self.pending);
            surface.once_style_ready(Box::new(move |surface: &mut dyn MapSurface| {
                let plan = pending.borrow_mut().take();
                if let Some(plan) = plan
                    && let Err(e) = plan.apply(surface)
                {
                    log::warn!("Deferred marker sync failed: {e}");
                }
            }));
        }

        Ok(SyncOutcome::Deferred)
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;
    use crate::state::MapLayerState;
    use crate::surface::SurfaceOp;
    use wildfire_map_risk_models::BoundingBox;

    struct FailingLoader;

    #[async_trait(?Send)]
    impl ImageLoader for FailingLoader {
        async fn load(&self, id: &str) -> Result<ImageResource, SurfaceError> {
            Err(SurfaceError::ImageLoad {
                id: id.to_string(),
                reason: "offline".to_string(),
            })
        }
    }

    fn stations() -> Vec<Marker> {
        vec![
            Marker {
                id: "kadikoy-1".to_string(),
                coord: Coordinate::new(29.03, 40.99),
            },
            Marker {
                id: "besiktas-2".to_string(),
                coord: Coordinate::new(29.0, 41.04),
            },
        ]
    }

    fn loaded_state() -> MapLayerState {
        let mut state = MapLayerState::new(BoundingBox::new(28.0, 40.7, 29.8, 41.6));
        state.finish_style_load();
        state
    }

    #[test]
    fn registers_image_before_layer() {
        let mut state = loaded_state();
        let layer = MarkerLayer::default();

        let outcome =
            block_on(layer.sync(Some(&mut state), &stations(), &StaticImageLoader)).unwrap();

        assert_eq!(outcome, SyncOutcome::Applied);
        let ops = state.journal();
        let image = ops
            .iter()
            .position(|op| matches!(op, SurfaceOp::AddImage { .. }))
            .unwrap();
        let add_layer = ops
            .iter()
            .position(|op| matches!(op, SurfaceOp::AddLayer { .. }))
            .unwrap();
        assert!(image < add_layer);
        assert_eq!(
            state.layer("custom-markers-layer").unwrap().layout.get("icon-image"),
            Some(&json!("fire-station"))
        );
    }

    #[test]
    fn second_sync_only_updates_data() {
        let mut state = loaded_state();
        let layer = MarkerLayer::default();
        block_on(layer.sync(Some(&mut state), &stations(), &StaticImageLoader)).unwrap();
        state.take_journal();

        block_on(layer.sync(Some(&mut state), &stations()[..1], &StaticImageLoader)).unwrap();

        assert_eq!(
            state.take_journal(),
            vec![SurfaceOp::SetSourceData {
                id: "custom-markers-src".to_string(),
                features: 1,
            }]
        );
    }

    #[test]
    fn loader_failure_creates_nothing() {
        let mut state = loaded_state();
        let layer = MarkerLayer::default();

        let result = block_on(layer.sync(Some(&mut state), &stations(), &FailingLoader));

        assert!(matches!(result, Err(SurfaceError::ImageLoad { .. })));
        assert!(!state.has_layer("custom-markers-layer"));
    }

    #[test]
    fn defers_layer_until_style_loads() {
        let mut state = MapLayerState::new(BoundingBox::new(28.0, 40.7, 29.8, 41.6));
        let layer = MarkerLayer::default();

        let outcome =
            block_on(layer.sync(Some(&mut state), &stations(), &StaticImageLoader)).unwrap();
        assert_eq!(outcome, SyncOutcome::Deferred);
        assert!(state.has_image(FIRE_STATION_IMAGE));
        assert!(!state.has_layer("custom-markers-layer"));

        state.finish_style_load();
        assert!(state.has_layer("custom-markers-layer"));
    }

    #[test]
    fn unknown_bundled_image_fails() {
        let result = block_on(StaticImageLoader.load("hydrant"));
        assert!(matches!(result, Err(SurfaceError::ImageLoad { id, .. }) if id == "hydrant"));
    }
}
