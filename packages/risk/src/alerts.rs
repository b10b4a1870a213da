//! Alert views over enriched risk cells.
//!
//! The "urgent" list collects every hotspot across all AOIs; the per-area
//! leaderboard keeps the highest-risk cells of each AOI regardless of the
//! threshold.

use std::collections::BTreeMap;

use serde::Serialize;
use wildfire_map_risk_models::EnrichedPoint;

use crate::aggregate::top_n;

/// Hotspots and per-AOI leaderboards for one snapshot.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertBoard {
    /// All hotspots, highest risk first.
    pub urgent: Vec<EnrichedPoint>,
    /// AOI id -> top cells by risk.
    pub per_area: BTreeMap<String, Vec<EnrichedPoint>>,
}

impl AlertBoard {
    /// Number of hotspots across all AOIs.
    #[must_use]
    pub fn urgent_count(&self) -> usize {
        self.urgent.len()
    }
}

/// Builds the alert board from enriched points.
///
/// Hotspot status comes from each point's `is_hotspot` flag, so the
/// threshold used during enrichment applies.
#[must_use]
pub fn build_alert_board(points: &[EnrichedPoint], leaderboard_size: usize) -> AlertBoard {
    let hotspots: Vec<EnrichedPoint> = points.iter().filter(|p| p.is_hotspot).cloned().collect();
    let urgent = top_n(&hotspots, hotspots.len());

    let mut by_area: BTreeMap<String, Vec<EnrichedPoint>> = BTreeMap::new();
    for point in points {
        by_area
            .entry(point.aoi_id.clone())
            .or_default()
            .push(point.clone());
    }

    let per_area = by_area
        .into_iter()
        .map(|(aoi, cells)| {
            let top = top_n(&cells, leaderboard_size);
            (aoi, top)
        })
        .collect();

    AlertBoard { urgent, per_area }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wildfire_map_risk_models::{Coordinate, RiskPoint};

    use crate::enrich::FeatureEnricher;

    fn cells(aoi: &str, risks: &[f64]) -> Vec<RiskPoint> {
        risks
            .iter()
            .map(|r| RiskPoint::new(Coordinate::new(0.0, 0.0), aoi).with_property("risk", *r))
            .collect()
    }

    #[test]
    fn urgent_collects_hotspots_across_areas() {
        let mut raw = cells("ist", &[0.8, 0.1]);
        raw.extend(cells("izmir", &[0.95, 0.76, 0.3]));
        let points = FeatureEnricher::default().enrich(&raw, 1.0, 0.75);

        let board = build_alert_board(&points, 10);
        let risks: Vec<f64> = board.urgent.iter().filter_map(|p| p.risk).collect();
        assert_eq!(risks, vec![0.95, 0.8, 0.76]);
        assert_eq!(board.urgent_count(), 3);
    }

    #[test]
    fn leaderboard_ignores_threshold_and_truncates() {
        let raw = cells("ankara", &[0.2, 0.6, 0.1, 0.4]);
        let points = FeatureEnricher::default().enrich(&raw, 1.0, 0.75);

        let board = build_alert_board(&points, 2);
        let top: Vec<f64> = board.per_area["ankara"].iter().filter_map(|p| p.risk).collect();
        assert_eq!(top, vec![0.6, 0.4]);
        assert!(board.urgent.is_empty());
    }
}
