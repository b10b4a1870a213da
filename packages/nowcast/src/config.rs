//! Dashboard configuration file.
//!
//! Every field has a default, so an empty file (or no file at all) gives
//! the stock dashboard: 90% opacity, hotspots at 0.75, the current hour,
//! the heuristic provider and a 28×28 sampling grid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use wildfire_map_risk_models::{
    DEFAULT_HOT_THRESHOLD, DEFAULT_OPACITY, DisplayConfig, RiskProvider,
};

pub const DEFAULT_GRID_SIZE: u32 = 28;

pub const DEFAULT_LEADERBOARD_SIZE: usize = 10;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";

/// Errors that can occur while loading a [`DashboardConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// Sampling grid resolution per AOI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    pub nx: u32,
    pub ny: u32,
}

impl Default for GridSize {
    fn default() -> Self {
        Self {
            nx: DEFAULT_GRID_SIZE,
            ny: DEFAULT_GRID_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    /// Risk layer opacity in `[0, 1]`.
    pub opacity: f64,
    /// Hotspot cutoff in `[0, 1]`.
    pub hot_threshold: f64,
    /// Forecast hour relative to now.
    pub hour_offset: i32,
    pub provider: RiskProvider,
    pub grid: GridSize,
    /// Cells per AOI on the alert leaderboard.
    pub leaderboard_size: usize,
    pub api_base_url: String,
    /// Administrative boundary `GeoJSON` for district lookup.
    pub boundaries_path: Option<PathBuf>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            opacity: DEFAULT_OPACITY,
            hot_threshold: DEFAULT_HOT_THRESHOLD,
            hour_offset: 0,
            provider: RiskProvider::default(),
            grid: GridSize::default(),
            leaderboard_size: DEFAULT_LEADERBOARD_SIZE,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            boundaries_path: None,
        }
    }
}

impl DashboardConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// * If the document is not valid TOML or has unknown keys
    /// * If a value is out of range
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a config file.
    ///
    /// # Errors
    ///
    /// * If the file cannot be read
    /// * If its content is invalid
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        log::debug!("Loading dashboard config from {}", path.display());
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::OutOfRange`] naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("opacity", self.opacity), ("hot_threshold", self.hot_threshold)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }
        for (field, value) in [("grid.nx", self.grid.nx), ("grid.ny", self.grid.ny)] {
            if value == 0 {
                return Err(ConfigError::OutOfRange {
                    field,
                    value: f64::from(value),
                });
            }
        }
        Ok(())
    }

    /// Display parameters for enrichment and layer sync.
    #[must_use]
    pub const fn display(&self) -> DisplayConfig {
        DisplayConfig {
            opacity: self.opacity,
            hot_threshold: self.hot_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = DashboardConfig::from_toml_str("").unwrap();
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(config.grid, GridSize { nx: 28, ny: 28 });
        assert_eq!(config.api_base_url, "http://localhost:8080");
        assert_eq!(config.provider, RiskProvider::Heuristic);
    }

    #[test]
    fn parses_overrides() {
        let config = DashboardConfig::from_toml_str(
            r#"
            opacity = 0.5
            hot_threshold = 0.6
            hour_offset = 3
            provider = "ai"
            leaderboard_size = 5
            boundaries_path = "data/tr-districts.geojson"

            [grid]
            nx = 10
            ny = 12
            "#,
        )
        .unwrap();

        assert!((config.opacity - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.hour_offset, 3);
        assert_eq!(config.provider, RiskProvider::Ai);
        assert_eq!(config.grid, GridSize { nx: 10, ny: 12 });
        assert_eq!(
            config.boundaries_path.as_deref(),
            Some(Path::new("data/tr-districts.geojson"))
        );
        assert!((config.display().hot_threshold - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = DashboardConfig::from_toml_str("hot_threshold = 1.5").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange { field: "hot_threshold", .. }
        ));

        let err = DashboardConfig::from_toml_str("[grid]\nnx = 0\nny = 4").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { field: "grid.nx", .. }));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(matches!(
            DashboardConfig::from_toml_str("opactiy = 0.3"),
            Err(ConfigError::Toml(_))
        ));
    }
}
