//! Offline risk grid for demos.
//!
//! [`mock_points`] lays an `nx × ny` grid over an AOI's bounding box and
//! fills it with a smooth wave-shaped risk field that drifts with the
//! forecast hour, plus weather values derived from it. The output has the
//! same shape as a nowcast response, so the rest of the pipeline cannot
//! tell the two apart.

use std::f64::consts::TAU;

use wildfire_map_risk::{SnapshotTracker, SnapshotVersion};
use wildfire_map_risk_models::{Coordinate, RiskPoint, WeatherField};

use crate::areas::Area;
use crate::client::NowcastParams;

/// Fraction along an axis of `n` samples.
fn axis_fraction(index: u32, n: u32) -> f64 {
    if n < 2 {
        0.0
    } else {
        f64::from(index) / f64::from(n - 1)
    }
}

fn lerp(min: f64, max: f64, t: f64) -> f64 {
    (1.0 - t).mul_add(min, t * max).clamp(min, max)
}

/// Risk at grid fraction `(u, v)` for `hour_offset`, in `[0, 1]`.
#[must_use]
pub fn risk_at(u: f64, v: f64, hour_offset: i32) -> f64 {
    let hour = f64::from(hour_offset);
    let wave = (u.mul_add(TAU, hour * 0.3).sin() * 0.5
        + v.mul_add(TAU, -hour * 0.2).cos() * 0.5)
        .max(0.0);
    0.4f64.mul_add(wave, 0.6 * u * v).clamp(0.0, 1.0)
}

/// Generates one AOI's grid.
#[must_use]
pub fn mock_points(area: &Area, params: NowcastParams) -> Vec<RiskPoint> {
    let bbox = area.bbox;
    let hour = f64::from(params.hour_offset);
    let mut points = Vec::new();

    for i in 0..params.grid.nx {
        for j in 0..params.grid.ny {
            let u = axis_fraction(i, params.grid.nx);
            let v = axis_fraction(j, params.grid.ny);
            let coordinate = Coordinate::new(
                lerp(bbox.min_lon, bbox.max_lon, u),
                lerp(bbox.min_lat, bbox.max_lat, v),
            );
            let risk = risk_at(u, v, params.hour_offset);

            let mut point = RiskPoint::new(coordinate, &area.id)
                .with_property(WeatherField::Risk.wire_key(), risk)
                .with_property(
                    WeatherField::Temperature.wire_key(),
                    15.0f64.mul_add(risk, 20.0),
                )
                .with_property(
                    WeatherField::RelativeHumidity.wire_key(),
                    (-45.0f64).mul_add(risk, 60.0),
                )
                .with_property(WeatherField::WindSpeed.wire_key(), 10.0f64.mul_add(v, 2.0))
                .with_property(
                    WeatherField::WindDirection.wire_key(),
                    u.mul_add(360.0, hour * 15.0).rem_euclid(360.0),
                );
            point.aoi_name = Some(area.name.clone());
            points.push(point);
        }
    }

    points
}

/// Fills a fresh snapshot version of `tracker` with mock grids for every
/// AOI.
pub fn fill_mock(
    areas: &[Area],
    params: NowcastParams,
    tracker: &mut SnapshotTracker,
) -> SnapshotVersion {
    let version = tracker.issue();
    log::info!(
        "Generating mock risk grids for {} AOI(s) (hour offset {})",
        areas.len(),
        params.hour_offset
    );
    for area in areas {
        tracker.accept(version, &area.id, mock_points(area, params));
    }
    version
}
