#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the wildfire risk-layer engine.
//!
//! Raw risk cells arrive as [`RiskPoint`] values tagged with the area of
//! interest (AOI) they were fetched for. Enrichment produces
//! [`EnrichedPoint`] records carrying colour, hotspot and district data,
//! and aggregation projects them into [`RegionStats`].

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, Display, EnumString};

/// Default hotspot cutoff applied when no threshold is configured.
pub const DEFAULT_HOT_THRESHOLD: f64 = 0.75;

/// Default layer opacity.
pub const DEFAULT_OPACITY: f64 = 0.9;

/// Label used when a boundary lacks either its city or district name.
pub const UNKNOWN_DISTRICT_LABEL: &str = "Unknown district";

/// A `(lon, lat)` position, serialized as a `[lon, lat]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

impl Coordinate {
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Squared planar distance in degree space. Only meaningful for
    /// ranking nearby candidates against each other.
    #[must_use]
    pub fn distance_sq(&self, other: &Self) -> f64 {
        let dx = self.lon - other.lon;
        let dy = self.lat - other.lat;
        dx.mul_add(dx, dy * dy)
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from([lon, lat]: [f64; 2]) -> Self {
        Self { lon, lat }
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(c: Coordinate) -> Self {
        [c.lon, c.lat]
    }
}

/// A visible map extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// Western edge.
    pub min_lon: f64,
    /// Southern edge.
    pub min_lat: f64,
    /// Eastern edge.
    pub max_lon: f64,
    /// Northern edge.
    pub max_lat: f64,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Whether `coord` lies inside or on the edge of this box.
    #[must_use]
    pub fn contains(&self, coord: &Coordinate) -> bool {
        (self.min_lon..=self.max_lon).contains(&coord.lon)
            && (self.min_lat..=self.max_lat).contains(&coord.lat)
    }
}

/// An 8-bit RGB colour with a fractional alpha channel.
///
/// Serializes to the CSS form `rgba(r,g,b,a)` that map style
/// expressions consume directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Alpha in `[0, 1]`.
    pub a: f64,
}

impl Rgba {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({},{},{},{})", self.r, self.g, self.b, self.a)
    }
}

impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Numeric properties carried by a risk cell.
///
/// Each field has a short wire key used by the nowcast API and a long
/// descriptive key accepted as a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum WeatherField {
    Risk,
    Temperature,
    RelativeHumidity,
    WindSpeed,
    WindDirection,
}

impl WeatherField {
    pub const ALL: &[Self] = &[
        Self::Risk,
        Self::Temperature,
        Self::RelativeHumidity,
        Self::WindSpeed,
        Self::WindDirection,
    ];

    /// Property key used on the wire (`temp`, `rh`, ...).
    #[must_use]
    pub const fn wire_key(self) -> &'static str {
        match self {
            Self::Risk => "risk",
            Self::Temperature => "temp",
            Self::RelativeHumidity => "rh",
            Self::WindSpeed => "wind",
            Self::WindDirection => "wind_dir",
        }
    }

    /// Descriptive property key (`temperature`, `relativeHumidity`, ...).
    #[must_use]
    pub const fn long_key(self) -> &'static str {
        match self {
            Self::Risk => "risk",
            Self::Temperature => "temperature",
            Self::RelativeHumidity => "relativeHumidity",
            Self::WindSpeed => "windSpeed",
            Self::WindDirection => "windDirectionDeg",
        }
    }

    /// Reads this field from a property map, preferring the wire key.
    #[must_use]
    pub fn read(self, properties: &Map<String, Value>) -> Option<f64> {
        properties
            .get(self.wire_key())
            .and_then(coerce_number)
            .or_else(|| properties.get(self.long_key()).and_then(coerce_number))
    }

    /// Whether `key` names this field under either spelling.
    #[must_use]
    pub fn matches_key(self, key: &str) -> bool {
        key == self.wire_key() || key == self.long_key()
    }
}

/// Coerces a JSON value to a finite `f64`.
///
/// Upstream encoders sometimes serialize numbers as strings, so both
/// `0.42` and `"0.42"` yield `Some(0.42)`. Anything else (including
/// empty strings and non-finite values) yields `None`.
#[must_use]
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Forecast provider requested from the nowcast API.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskProvider {
    /// Rule-based VPD/wind/fuel model.
    #[default]
    Heuristic,
    /// Model-backed forecast.
    Ai,
}

/// Display parameters for the risk layers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayConfig {
    /// Layer transparency in `[0, 1]`.
    pub opacity: f64,
    /// Hotspot cutoff in `[0, 1]`.
    pub hot_threshold: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            opacity: DEFAULT_OPACITY,
            hot_threshold: DEFAULT_HOT_THRESHOLD,
        }
    }
}

impl DisplayConfig {
    /// Returns a copy with both values clamped into `[0, 1]`.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            opacity: self.opacity.clamp(0.0, 1.0),
            hot_threshold: self.hot_threshold.clamp(0.0, 1.0),
        }
    }
}

/// A raw risk cell as delivered by the fetch collaborator.
///
/// Property values are kept as untyped JSON because numeric fields may
/// arrive string-encoded. Enrichment never mutates a `RiskPoint`; it
/// always produces a new [`EnrichedPoint`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskPoint {
    /// Cell centre.
    pub coordinate: Coordinate,
    /// Identifier of the AOI this cell was fetched for.
    pub aoi_id: String,
    /// Human-readable AOI name.
    pub aoi_name: Option<String>,
    /// Raw feature properties.
    pub properties: Map<String, Value>,
}

impl RiskPoint {
    #[must_use]
    pub fn new(coordinate: Coordinate, aoi_id: impl Into<String>) -> Self {
        Self {
            coordinate,
            aoi_id: aoi_id.into(),
            aoi_name: None,
            properties: Map::new(),
        }
    }

    /// Sets a raw property, returning `self` for chaining.
    #[must_use]
    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Reads a numeric field, coercing string-encoded numbers.
    #[must_use]
    pub fn field(&self, field: WeatherField) -> Option<f64> {
        field.read(&self.properties)
    }

    /// Reads a non-empty string property.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Builds a risk point from a `GeoJSON` point feature.
    ///
    /// Returns `None` when the feature has no point geometry.
    #[must_use]
    pub fn from_feature(
        feature: &geojson::Feature,
        aoi_id: &str,
        aoi_name: Option<&str>,
    ) -> Option<Self> {
        let geometry = feature.geometry.as_ref()?;
        let geojson::Value::Point(position) = &geometry.value else {
            return None;
        };
        let (&lon, &lat) = (position.first()?, position.get(1)?);

        Some(Self {
            coordinate: Coordinate::new(lon, lat),
            aoi_id: aoi_id.to_string(),
            aoi_name: aoi_name.map(str::to_string),
            properties: feature.properties.clone().unwrap_or_default(),
        })
    }
}

/// A risk cell after colouring, hotspot classification and district
/// resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedPoint {
    pub coordinate: Coordinate,
    /// Coerced risk score; `None` when absent or not numeric.
    pub risk: Option<f64>,
    pub temperature: Option<f64>,
    /// Relative humidity in percent.
    pub relative_humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    /// Wind bearing in degrees.
    pub wind_direction_deg: Option<f64>,
    pub color: Rgba,
    pub is_hotspot: bool,
    /// District name alone (e.g. `"Kadıköy"`).
    pub district: Option<String>,
    pub region: Option<String>,
    pub city_name: Option<String>,
    /// Combined `"City / District"` label.
    pub city_label: Option<String>,
    pub aoi_id: String,
    pub aoi_name: Option<String>,
    /// Remaining raw properties that were not recognized.
    pub extra: Map<String, Value>,
}

impl EnrichedPoint {
    /// Risk used for colouring and ranking; missing risk counts as zero.
    #[must_use]
    pub fn risk_or_zero(&self) -> f64 {
        self.risk.unwrap_or(0.0)
    }

    /// Whether temperature, humidity and wind speed are all present.
    #[must_use]
    pub const fn has_full_weather(&self) -> bool {
        self.temperature.is_some() && self.relative_humidity.is_some() && self.wind_speed.is_some()
    }

    /// Converts this point into a `GeoJSON` feature for a map source.
    ///
    /// Numeric fields use their wire keys so style expressions such as
    /// `["get", "risk"]` resolve against them.
    #[must_use]
    pub fn to_feature(&self) -> geojson::Feature {
        let mut props = self.extra.clone();

        let numeric = [
            (WeatherField::Risk, self.risk),
            (WeatherField::Temperature, self.temperature),
            (WeatherField::RelativeHumidity, self.relative_humidity),
            (WeatherField::WindSpeed, self.wind_speed),
            (WeatherField::WindDirection, self.wind_direction_deg),
        ];
        for (field, value) in numeric {
            if let Some(v) = value {
                props.insert(field.wire_key().to_string(), Value::from(v));
            }
        }

        props.insert("color".to_string(), Value::String(self.color.to_string()));
        props.insert("hotspot".to_string(), Value::Bool(self.is_hotspot));
        props.insert("aoiId".to_string(), Value::String(self.aoi_id.clone()));

        let text = [
            ("aoiName", &self.aoi_name),
            ("districtName", &self.district),
            ("cityName", &self.city_name),
            ("cityLabel", &self.city_label),
            ("region", &self.region),
        ];
        for (key, value) in text {
            if let Some(v) = value {
                props.insert(key.to_string(), Value::String(v.clone()));
            }
        }

        geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![
                self.coordinate.lon,
                self.coordinate.lat,
            ]))),
            id: None,
            properties: Some(props),
            foreign_members: None,
        }
    }
}

/// Builds a `FeatureCollection` payload from enriched points.
#[must_use]
pub fn to_feature_collection(points: &[EnrichedPoint]) -> geojson::FeatureCollection {
    geojson::FeatureCollection {
        bbox: None,
        features: points.iter().map(EnrichedPoint::to_feature).collect(),
        foreign_members: None,
    }
}

/// Result of resolving a coordinate to an administrative district.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictLookup {
    pub city_name: Option<String>,
    pub district_name: Option<String>,
    pub region: Option<String>,
    /// `"City / District"`, or [`UNKNOWN_DISTRICT_LABEL`].
    pub label: String,
}

impl DistrictLookup {
    #[must_use]
    pub fn new(
        city_name: Option<String>,
        district_name: Option<String>,
        region: Option<String>,
    ) -> Self {
        let label = match (&city_name, &district_name) {
            (Some(city), Some(district)) => format!("{city} / {district}"),
            _ => UNKNOWN_DISTRICT_LABEL.to_string(),
        };
        Self {
            city_name,
            district_name,
            region,
            label,
        }
    }
}

/// An administrative boundary polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminBoundary {
    pub id: String,
    pub city_name: Option<String>,
    pub district_name: Option<String>,
    pub region: Option<String>,
    /// Polygon or `MultiPolygon` geometry; anything else is rejected when
    /// the spatial index is built.
    pub geometry: Option<geojson::Geometry>,
}

impl AdminBoundary {
    /// Builds a boundary from a `GeoJSON` feature.
    ///
    /// Accepts both `cityName`/`districtName` and the shorter
    /// `city`/`district` property names. The boundary id is the feature
    /// id when present, otherwise `fallback_id`.
    #[must_use]
    pub fn from_feature(feature: &geojson::Feature, fallback_id: &str) -> Self {
        let text = |keys: &[&str]| -> Option<String> {
            let props = feature.properties.as_ref()?;
            keys.iter().find_map(|key| {
                props
                    .get(*key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
        };

        let id = match &feature.id {
            Some(geojson::feature::Id::String(s)) => s.clone(),
            Some(geojson::feature::Id::Number(n)) => n.to_string(),
            None => fallback_id.to_string(),
        };

        Self {
            id,
            city_name: text(&["cityName", "city"]),
            district_name: text(&["districtName", "district"]),
            region: text(&["region"]),
            geometry: feature.geometry.clone(),
        }
    }
}

/// Aggregate weather statistics over a set of enriched points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionStats {
    pub mean_temperature: f64,
    pub mean_humidity: f64,
    pub mean_wind_speed: f64,
    /// Circular mean bearing in `[0, 360)`; absent when no point carries
    /// a direction or the directions cancel out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_wind_direction_deg: Option<f64>,
    /// Points with temperature, humidity and wind speed all present.
    pub sample_count: usize,
    /// Points with a wind direction.
    pub wind_direction_samples: usize,
}

/// Normalized payload emitted when the operator clicks a risk cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellPressed {
    pub risk: Option<f64>,
    pub temperature: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub aoi_id: Option<String>,
    pub aoi_name: Option<String>,
    pub district: Option<String>,
    /// `"City / District"` label of the clicked cell.
    pub city_label: Option<String>,
    /// Clicked feature position.
    pub coord: Coordinate,
}

impl CellPressed {
    /// Normalizes the properties of a clicked feature.
    #[must_use]
    pub fn from_properties(coord: Coordinate, properties: &Map<String, Value>) -> Self {
        let text = |key: &str| {
            properties
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            risk: WeatherField::Risk.read(properties),
            temperature: WeatherField::Temperature.read(properties),
            relative_humidity: WeatherField::RelativeHumidity.read(properties),
            wind_speed: WeatherField::WindSpeed.read(properties),
            wind_direction_deg: WeatherField::WindDirection.read(properties),
            aoi_id: text("aoiId"),
            aoi_name: text("aoiName"),
            district: text("districtName"),
            city_label: text("cityLabel"),
            coord,
        }
    }
}
