//! Versioned risk snapshots assembled from per-AOI fetch results.
//!
//! Every configuration change (e.g. a new forecast hour) issues a new
//! [`SnapshotVersion`]. Fetches for several AOIs may be in flight at once
//! and resolve in any order; a result tagged with an older version is
//! dropped on arrival so stale data never replaces fresher data.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use wildfire_map_risk_models::RiskPoint;

use crate::enrich::merge_areas;

/// Monotonically increasing snapshot identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SnapshotVersion(u64);

impl SnapshotVersion {
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Load state of one AOI within the current snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AoiStatus {
    /// Fetch issued, no result yet.
    Pending,
    /// Data available.
    Ready {
        cells: usize,
        fetched_at: DateTime<Utc>,
    },
    /// Fetch failed; the UI shows this AOI as unavailable.
    Unavailable { reason: String },
}

struct AoiSlot {
    status: AoiStatus,
    points: Vec<RiskPoint>,
}

/// Collects per-AOI results for the latest snapshot version.
pub struct SnapshotTracker {
    /// AOI ids in registration order; merged output follows this order.
    areas: Vec<String>,
    latest: SnapshotVersion,
    slots: BTreeMap<String, AoiSlot>,
}

impl SnapshotTracker {
    /// Creates a tracker for the given AOI ids. No version is issued yet.
    #[must_use]
    pub fn new<I, S>(areas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            areas: areas.into_iter().map(Into::into).collect(),
            latest: SnapshotVersion(0),
            slots: BTreeMap::new(),
        }
    }

    /// Issues a new snapshot version and discards every older result.
    pub fn issue(&mut self) -> SnapshotVersion {
        self.latest = SnapshotVersion(self.latest.0 + 1);
        self.slots = self
            .areas
            .iter()
            .map(|aoi| {
                (
                    aoi.clone(),
                    AoiSlot {
                        status: AoiStatus::Pending,
                        points: Vec::new(),
                    },
                )
            })
            .collect();
        log::debug!("Issued risk snapshot v{}", self.latest.0);
        self.latest
    }

    /// The most recently issued version.
    #[must_use]
    pub const fn latest(&self) -> SnapshotVersion {
        self.latest
    }

    /// Stores the result of a fetch.
    ///
    /// Returns `false`, leaving state untouched, when `version` is not the
    /// latest issued or `aoi_id` is not a registered AOI.
    pub fn accept(
        &mut self,
        version: SnapshotVersion,
        aoi_id: &str,
        points: Vec<RiskPoint>,
    ) -> bool {
        if version != self.latest {
            log::debug!(
                "Dropping stale snapshot v{} for {aoi_id} (latest v{})",
                version.0,
                self.latest.0
            );
            return false;
        }

        let Some(slot) = self.slots.get_mut(aoi_id) else {
            log::warn!("Ignoring result for unknown AOI {aoi_id}");
            return false;
        };

        slot.status = AoiStatus::Ready {
            cells: points.len(),
            fetched_at: Utc::now(),
        };
        slot.points = points;
        true
    }

    /// Marks an AOI fetch as failed.
    ///
    /// Stale failures are ignored just like stale results.
    pub fn fail(
        &mut self,
        version: SnapshotVersion,
        aoi_id: &str,
        reason: impl Into<String>,
    ) -> bool {
        if version != self.latest {
            return false;
        }
        let Some(slot) = self.slots.get_mut(aoi_id) else {
            return false;
        };
        let reason = reason.into();
        log::warn!("Risk data unavailable for {aoi_id}: {reason}");
        slot.status = AoiStatus::Unavailable { reason };
        slot.points.clear();
        true
    }

    /// Status of one AOI, if registered and a version has been issued.
    #[must_use]
    pub fn status(&self, aoi_id: &str) -> Option<&AoiStatus> {
        self.slots.get(aoi_id).map(|slot| &slot.status)
    }

    /// Statuses of all AOIs in registration order.
    #[must_use]
    pub fn statuses(&self) -> Vec<(&str, &AoiStatus)> {
        self.areas
            .iter()
            .filter_map(|aoi| self.slots.get(aoi).map(|slot| (aoi.as_str(), &slot.status)))
            .collect()
    }

    /// Whether any AOI is still pending.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.slots
            .values()
            .any(|slot| slot.status == AoiStatus::Pending)
    }

    /// Whether any AOI failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.slots
            .values()
            .any(|slot| matches!(slot.status, AoiStatus::Unavailable { .. }))
    }

    /// Concatenates the points of every ready AOI in registration order.
    #[must_use]
    pub fn merged(&self) -> Vec<RiskPoint> {
        merge_areas(
            self.areas
                .iter()
                .filter_map(|aoi| self.slots.get(aoi))
                .map(|slot| slot.points.iter().cloned()),
        )
    }
}

/// Converts a nowcast `FeatureCollection` into AOI-tagged risk points.
///
/// Features without point geometry are skipped.
#[must_use]
pub fn points_from_collection(
    collection: &geojson::FeatureCollection,
    aoi_id: &str,
    aoi_name: Option<&str>,
) -> Vec<RiskPoint> {
    let points: Vec<RiskPoint> = collection
        .features
        .iter()
        .filter_map(|feature| RiskPoint::from_feature(feature, aoi_id, aoi_name))
        .collect();

    let skipped = collection.features.len() - points.len();
    if skipped > 0 {
        log::warn!("Skipped {skipped} non-point features in snapshot for {aoi_id}");
    }

    points
}
