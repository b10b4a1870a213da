//! Area-of-interest registry.
//!
//! Each AOI is a TOML file under `areas/`, embedded at compile time via
//! [`include_str!`]. Registration order is the order cells are merged in.

use serde::{Deserialize, Serialize};
use wildfire_map_risk_models::BoundingBox;

/// A named region fetched as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    /// Stable id, also used as the snapshot file stem.
    pub id: String,
    /// Display name.
    pub name: String,
    pub bbox: BoundingBox,
}

const AREA_TOMLS: &[(&str, &str)] = &[
    ("ist", include_str!("../areas/ist.toml")),
    ("izmir", include_str!("../areas/izmir.toml")),
    ("ankara", include_str!("../areas/ankara.toml")),
];

#[cfg(test)]
const EXPECTED_AREA_COUNT: usize = 3;

/// Returns every configured AOI in registration order.
///
/// # Panics
///
/// Panics if an embedded TOML file is malformed.
#[must_use]
pub fn all_areas() -> Vec<Area> {
    AREA_TOMLS
        .iter()
        .map(|(name, toml)| {
            toml::from_str(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Looks up an AOI by id.
#[must_use]
pub fn find_area(id: &str) -> Option<Area> {
    all_areas().into_iter().find(|area| area.id == id)
}
