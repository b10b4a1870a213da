//! Turns raw risk cells into display-ready [`EnrichedPoint`] records.
//!
//! Enrichment coerces string-encoded numbers, colours each cell,
//! classifies hotspots and attaches district information, either from
//! tags the fetch collaborator already set, from the [`SpatialIndex`], or
//! from both when the tags are incomplete.

use serde_json::Map;
use wildfire_map_risk_models::{DistrictLookup, EnrichedPoint, RiskPoint, WeatherField};
use wildfire_map_spatial::SpatialIndex;

use crate::classify::{color_for, is_hotspot};

/// Property keys that enrichment derives itself and never copies into
/// [`EnrichedPoint::extra`].
const DERIVED_KEYS: &[&str] = &[
    "color",
    "hotspot",
    "aoiId",
    "aoiName",
    "districtName",
    "cityName",
    "cityLabel",
    "region",
];

/// Enriches risk cells against an optional district index.
///
/// Without an index only pre-tagged cells receive district data.
#[derive(Clone, Copy, Default)]
pub struct FeatureEnricher<'a> {
    index: Option<&'a SpatialIndex>,
}

impl<'a> FeatureEnricher<'a> {
    #[must_use]
    pub const fn new(index: Option<&'a SpatialIndex>) -> Self {
        Self { index }
    }

    /// Enriches every point. Output order and length match the input;
    /// points without a risk score are kept and drawn as zero risk.
    #[must_use]
    pub fn enrich(
        &self,
        points: &[RiskPoint],
        opacity: f64,
        hot_threshold: f64,
    ) -> Vec<EnrichedPoint> {
        let enriched: Vec<EnrichedPoint> = points
            .iter()
            .map(|point| self.enrich_point(point, opacity, hot_threshold))
            .collect();

        log::debug!(
            "Enriched {} risk cells ({} hotspots at threshold {hot_threshold})",
            enriched.len(),
            enriched.iter().filter(|p| p.is_hotspot).count()
        );

        enriched
    }

    /// Enriches a single point.
    #[must_use]
    pub fn enrich_point(
        &self,
        point: &RiskPoint,
        opacity: f64,
        hot_threshold: f64,
    ) -> EnrichedPoint {
        let risk = point.field(WeatherField::Risk);
        let district = self.resolve_district(point);

        let extra: Map<_, _> = point
            .properties
            .iter()
            .filter(|(key, _)| {
                !DERIVED_KEYS.contains(&key.as_str())
                    && !WeatherField::ALL.iter().any(|f| f.matches_key(key))
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let (district_name, city_name, region, city_label) = match district {
            Some(d) => (d.district_name, d.city_name, d.region, Some(d.label)),
            None => (None, None, None, None),
        };

        EnrichedPoint {
            coordinate: point.coordinate,
            risk,
            temperature: point.field(WeatherField::Temperature),
            relative_humidity: point.field(WeatherField::RelativeHumidity),
            wind_speed: point.field(WeatherField::WindSpeed),
            wind_direction_deg: point.field(WeatherField::WindDirection),
            color: color_for(risk.unwrap_or(0.0), opacity),
            is_hotspot: risk.is_some_and(|r| is_hotspot(r, hot_threshold)),
            district: district_name,
            region,
            city_name,
            city_label,
            aoi_id: point.aoi_id.clone(),
            aoi_name: point
                .aoi_name
                .clone()
                .or_else(|| point.text("aoiName").map(str::to_string)),
            extra,
        }
    }

    /// Pre-populated tags win over a spatial query. A cell tagged with
    /// only one of `cityName`/`districtName` still gets the other from the
    /// index.
    fn resolve_district(&self, point: &RiskPoint) -> Option<DistrictLookup> {
        let tagged_city = point.text("cityName");
        let tagged_district = point.text("districtName");

        let found = if tagged_city.is_some() && tagged_district.is_some() {
            None
        } else {
            self.index
                .and_then(|index| index.lookup(point.coordinate.lon, point.coordinate.lat))
        };

        if tagged_city.is_none() && tagged_district.is_none() {
            return found.cloned();
        }

        let mut lookup = DistrictLookup::new(
            tagged_city
                .map(str::to_string)
                .or_else(|| found.and_then(|f| f.city_name.clone())),
            tagged_district
                .map(str::to_string)
                .or_else(|| found.and_then(|f| f.district_name.clone())),
            point
                .text("region")
                .map(str::to_string)
                .or_else(|| found.and_then(|f| f.region.clone())),
        );
        if let Some(label) = point.text("cityLabel") {
            label.clone_into(&mut lookup.label);
        }
        Some(lookup)
    }
}

/// Concatenates the points of several AOI fetches.
///
/// No deduplication happens across AOIs: overlapping areas may yield
/// near-duplicate cells and both are kept.
#[must_use]
pub fn merge_areas<I>(areas: I) -> Vec<RiskPoint>
where
    I: IntoIterator,
    I::Item: IntoIterator<Item = RiskPoint>,
{
    areas.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wildfire_map_risk_models::{Coordinate, Rgba, UNKNOWN_DISTRICT_LABEL};

    fn index() -> SpatialIndex {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {
                    "city": "Ankara",
                    "district": "Çankaya",
                    "region": "İç Anadolu"
                },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [32.7, 39.8], [32.9, 39.8], [32.9, 40.0], [32.7, 40.0], [32.7, 39.8]
                    ]]
                }
            }]
        });
        SpatialIndex::from_geojson_str(&doc.to_string()).unwrap()
    }

    #[test]
    fn coerces_string_risk() {
        let point = RiskPoint::new(Coordinate::new(0.0, 0.0), "x").with_property("risk", "0.42");
        let enriched = FeatureEnricher::default().enrich(&[point], 1.0, 0.75);
        assert_eq!(enriched[0].risk, Some(0.42));
        assert!(!enriched[0].is_hotspot);
    }

    #[test]
    fn coerces_weather_fields_under_both_spellings() {
        let point = RiskPoint::new(Coordinate::new(0.0, 0.0), "x")
            .with_property("temp", "28.5")
            .with_property("relativeHumidity", 22)
            .with_property("wind", "6")
            .with_property("windDirectionDeg", "270");
        let e = FeatureEnricher::default().enrich_point(&point, 1.0, 0.75);
        assert_eq!(e.temperature, Some(28.5));
        assert_eq!(e.relative_humidity, Some(22.0));
        assert_eq!(e.wind_speed, Some(6.0));
        assert_eq!(e.wind_direction_deg, Some(270.0));
    }

    #[test]
    fn missing_risk_is_kept_and_drawn_as_zero() {
        let points = vec![
            RiskPoint::new(Coordinate::new(0.0, 0.0), "x"),
            RiskPoint::new(Coordinate::new(1.0, 0.0), "x").with_property("risk", 0.9),
        ];
        let enriched = FeatureEnricher::default().enrich(&points, 0.5, 0.75);
        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].risk, None);
        assert_eq!(enriched[0].color, Rgba::new(0, 255, 0, 0.5));
        assert!(!enriched[0].is_hotspot);
        assert!(enriched[1].is_hotspot);
    }

    #[test]
    fn resolves_district_from_index() {
        let index = index();
        let point =
            RiskPoint::new(Coordinate::new(32.85, 39.9), "ankara").with_property("risk", 0.3);
        let e = FeatureEnricher::new(Some(&index)).enrich_point(&point, 1.0, 0.75);
        assert_eq!(e.district.as_deref(), Some("Çankaya"));
        assert_eq!(e.city_name.as_deref(), Some("Ankara"));
        assert_eq!(e.region.as_deref(), Some("İç Anadolu"));
        assert_eq!(e.city_label.as_deref(), Some("Ankara / Çankaya"));
    }

    #[test]
    fn prepopulated_tags_win_over_lookup() {
        let index = index();
        let point = RiskPoint::new(Coordinate::new(32.85, 39.9), "ankara")
            .with_property("cityName", "Ankara")
            .with_property("districtName", "Keçiören");
        let e = FeatureEnricher::new(Some(&index)).enrich_point(&point, 1.0, 0.75);
        assert_eq!(e.district.as_deref(), Some("Keçiören"));
        assert_eq!(e.city_label.as_deref(), Some("Ankara / Keçiören"));
    }

    #[test]
    fn partial_tags_are_completed_from_lookup() {
        let index = index();
        let enricher = FeatureEnricher::new(Some(&index));

        let city_only = RiskPoint::new(Coordinate::new(32.8, 39.9), "ankara")
            .with_property("cityName", "Ankara");
        let e = enricher.enrich_point(&city_only, 1.0, 0.75);
        assert_eq!(e.district.as_deref(), Some("Çankaya"));
        assert_eq!(e.region.as_deref(), Some("İç Anadolu"));
        assert_eq!(e.city_label.as_deref(), Some("Ankara / Çankaya"));

        let district_only = RiskPoint::new(Coordinate::new(32.8, 39.9), "ankara")
            .with_property("districtName", "Çankaya");
        let e = enricher.enrich_point(&district_only, 1.0, 0.75);
        assert_eq!(e.city_name.as_deref(), Some("Ankara"));
        assert_eq!(e.city_label.as_deref(), Some("Ankara / Çankaya"));
    }

    #[test]
    fn partial_tags_outside_index_keep_unknown_label() {
        let index = index();
        let point =
            RiskPoint::new(Coordinate::new(-40.0, 20.0), "sea").with_property("cityName", "Ankara");
        let e = FeatureEnricher::new(Some(&index)).enrich_point(&point, 1.0, 0.75);
        assert_eq!(e.city_name.as_deref(), Some("Ankara"));
        assert!(e.district.is_none());
        assert_eq!(e.city_label.as_deref(), Some(UNKNOWN_DISTRICT_LABEL));
    }

    #[test]
    fn offshore_points_have_no_district() {
        let index = index();
        let point = RiskPoint::new(Coordinate::new(-40.0, 20.0), "sea");
        let e = FeatureEnricher::new(Some(&index)).enrich_point(&point, 1.0, 0.75);
        assert!(e.district.is_none());
        assert!(e.city_label.is_none());
    }

    #[test]
    fn keeps_unrecognized_properties_as_extra() {
        let point = RiskPoint::new(Coordinate::new(0.0, 0.0), "x")
            .with_property("risk", 0.1)
            .with_property("fuel", "pine_forest")
            .with_property("color", "stale");
        let e = FeatureEnricher::default().enrich_point(&point, 1.0, 0.75);
        assert_eq!(e.extra.get("fuel"), Some(&json!("pine_forest")));
        assert!(!e.extra.contains_key("color"));
        assert!(!e.extra.contains_key("risk"));
    }

    #[test]
    fn merge_keeps_duplicates_across_areas() {
        let a = vec![RiskPoint::new(Coordinate::new(29.0, 41.0), "a")];
        let b = vec![
            RiskPoint::new(Coordinate::new(29.0, 41.0), "b"),
            RiskPoint::new(Coordinate::new(29.1, 41.0), "b"),
        ];
        let merged = merge_areas([a, b]);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].aoi_id, "a");
        assert_eq!(merged[1].aoi_id, "b");
    }
}
