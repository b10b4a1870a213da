#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory spatial index for district attribution.
//!
//! Loads administrative boundary polygons once at startup, builds an
//! R-tree over their bounding boxes, and answers point-in-polygon
//! lookups. Used by risk-cell enrichment and the `lookup` CLI command.

use std::path::Path;

use geo::{BoundingRect, Intersects, MultiPolygon};
use geojson::GeoJson;
use rstar::{AABB, RTree, RTreeObject};
use wildfire_map_risk_models::{AdminBoundary, DistrictLookup};

/// Errors that can occur while building the index.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// Reading the boundaries file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The boundaries document is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The document parsed but is not a `FeatureCollection`.
    #[error("Expected a FeatureCollection of boundaries")]
    NotFeatureCollection,
}

/// A boundary polygon stored in the R-tree with its metadata.
struct BoundaryEntry {
    /// Position in the load order; lower wins when polygons overlap.
    order: usize,
    lookup: DistrictLookup,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for BoundaryEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built spatial index over administrative districts.
///
/// Constructed once and read-only afterwards.
pub struct SpatialIndex {
    districts: RTree<BoundaryEntry>,
    skipped: usize,
}

impl SpatialIndex {
    /// Builds the index from boundaries.
    ///
    /// Boundaries whose geometry is missing or not a polygon are skipped
    /// with a warning rather than failing the whole build.
    #[must_use]
    pub fn load(boundaries: Vec<AdminBoundary>) -> Self {
        let mut entries = Vec::with_capacity(boundaries.len());
        let mut skipped = 0;

        for (order, boundary) in boundaries.into_iter().enumerate() {
            let Some(polygon) = boundary.geometry.and_then(geometry_to_multipolygon) else {
                log::warn!(
                    "Skipping boundary {}: missing or malformed polygon geometry",
                    boundary.id
                );
                skipped += 1;
                continue;
            };

            let Some(envelope) = compute_envelope(&polygon) else {
                log::warn!("Skipping boundary {}: empty polygon", boundary.id);
                skipped += 1;
                continue;
            };

            entries.push(BoundaryEntry {
                order,
                lookup: DistrictLookup::new(
                    boundary.city_name,
                    boundary.district_name,
                    boundary.region,
                ),
                envelope,
                polygon,
            });
        }

        let districts = RTree::bulk_load(entries);
        log::info!(
            "Loaded {} district boundaries into spatial index ({skipped} skipped)",
            districts.size()
        );

        Self { districts, skipped }
    }

    /// Parses a boundary `FeatureCollection` and builds the index.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the document is not valid `GeoJSON` or
    /// is not a `FeatureCollection`. Individual malformed features do not
    /// cause an error.
    pub fn from_geojson_str(geojson_str: &str) -> Result<Self, SpatialError> {
        let GeoJson::FeatureCollection(collection) = geojson_str.parse::<GeoJson>()? else {
            return Err(SpatialError::NotFeatureCollection);
        };

        let boundaries = collection
            .features
            .iter()
            .enumerate()
            .map(|(i, feature)| AdminBoundary::from_feature(feature, &format!("boundary-{i}")))
            .collect();

        Ok(Self::load(boundaries))
    }

    /// Reads a boundary `FeatureCollection` from disk and builds the index.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, SpatialError> {
        log::info!("Loading district boundaries from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_geojson_str(&contents)
    }

    /// Number of indexed boundaries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.districts.size()
    }

    /// Whether no boundary was indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.districts.size() == 0
    }

    /// Number of boundaries rejected during the build.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    /// Looks up the district containing a point.
    ///
    /// Points on a polygon edge count as inside. When several polygons
    /// match, the one loaded first wins. Returns `None` for non-finite
    /// coordinates or points outside every boundary.
    #[must_use]
    pub fn lookup(&self, lon: f64, lat: f64) -> Option<&DistrictLookup> {
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }

        let point = geo::Point::new(lon, lat);
        let query_env = AABB::from_point([lon, lat]);

        self.districts
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.intersects(&point))
            .min_by_key(|entry| entry.order)
            .map(|entry| &entry.lookup)
    }

    /// Looks up a district from optional coordinates.
    #[must_use]
    pub fn lookup_opt(&self, lon: Option<f64>, lat: Option<f64>) -> Option<&DistrictLookup> {
        self.lookup(lon?, lat?)
    }
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn geometry_to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Computes the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
