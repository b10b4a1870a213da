//! Regional weather statistics and risk rankings.
//!
//! Scalar means (temperature, humidity, wind speed) share one
//! denominator: the number of points carrying all three values. Only
//! those points contribute, so the three means always describe the same
//! sample. Wind direction is averaged on the circle over every point
//! that carries a bearing.

use wildfire_map_risk_models::{EnrichedPoint, RegionStats};

/// Resultant vectors shorter than this are treated as "no prevailing
/// direction".
const MIN_RESULTANT: f64 = 1e-9;

/// Computes regional statistics.
///
/// Returns `None` when no point has temperature, humidity and wind speed
/// all present.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn aggregate(points: &[EnrichedPoint]) -> Option<RegionStats> {
    let mut sum_temp = 0.0;
    let mut sum_rh = 0.0;
    let mut sum_wind = 0.0;
    let mut n = 0_usize;

    for point in points {
        if let (Some(t), Some(rh), Some(ws)) =
            (point.temperature, point.relative_humidity, point.wind_speed)
        {
            sum_temp += t;
            sum_rh += rh;
            sum_wind += ws;
            n += 1;
        }
    }

    if n == 0 {
        return None;
    }

    let bearings: Vec<f64> = points.iter().filter_map(|p| p.wind_direction_deg).collect();
    let count = n as f64;

    Some(RegionStats {
        mean_temperature: sum_temp / count,
        mean_humidity: sum_rh / count,
        mean_wind_speed: sum_wind / count,
        mean_wind_direction_deg: circular_mean_deg(&bearings),
        sample_count: n,
        wind_direction_samples: bearings.len(),
    })
}

/// Circular mean of compass bearings in degrees, normalized to `[0, 360)`.
///
/// Returns `None` for an empty input or when the bearings cancel out
/// (e.g. `[0, 180]`).
#[must_use]
pub fn circular_mean_deg(bearings: &[f64]) -> Option<f64> {
    if bearings.is_empty() {
        return None;
    }

    let (sum_sin, sum_cos) = bearings.iter().fold((0.0_f64, 0.0_f64), |(s, c), deg| {
        let rad = deg.to_radians();
        (s + rad.sin(), c + rad.cos())
    });

    if sum_sin.hypot(sum_cos) < MIN_RESULTANT {
        return None;
    }

    Some(normalize_deg(sum_sin.atan2(sum_cos).to_degrees()))
}

/// Folds any angle into `[0, 360)`.
#[must_use]
pub fn normalize_deg(deg: f64) -> f64 {
    let n = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if n >= 360.0 { 0.0 } else { n }
}

/// Returns the `n` highest-risk points, highest first.
///
/// The sort is stable, so equal risks keep their input order. Missing
/// risk ranks as zero.
#[must_use]
pub fn top_n(points: &[EnrichedPoint], n: usize) -> Vec<EnrichedPoint> {
    let mut ranked: Vec<&EnrichedPoint> = points.iter().collect();
    ranked.sort_by(|a, b| b.risk_or_zero().total_cmp(&a.risk_or_zero()));
    ranked.into_iter().take(n).cloned().collect()
}

/// Formats a bearing as an 8-point compass label, e.g. `"NE, 45°"`.
///
/// Returns `"-"` for a missing or non-finite bearing.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn compass_label(deg: Option<f64>) -> String {
    const POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

    let Some(deg) = deg.filter(|d| d.is_finite()) else {
        return "-".to_string();
    };

    let normalized = normalize_deg(deg);
    let sector = (normalized / 45.0).round() as usize % POINTS.len();
    format!("{}, {}°", POINTS[sector], normalized.round())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wildfire_map_risk_models::{Coordinate, RiskPoint};

    use crate::enrich::FeatureEnricher;

    fn point(risk: f64, weather: Option<(f64, f64, f64)>, dir: Option<f64>) -> EnrichedPoint {
        let mut raw = RiskPoint::new(Coordinate::new(0.0, 0.0), "x").with_property("risk", risk);
        if let Some((t, rh, ws)) = weather {
            raw = raw
                .with_property("temp", t)
                .with_property("rh", rh)
                .with_property("wind", ws);
        }
        if let Some(d) = dir {
            raw = raw.with_property("wind_dir", d);
        }
        FeatureEnricher::default().enrich_point(&raw, 1.0, 0.75)
    }

    fn angular_distance(a: f64, b: f64) -> f64 {
        let d = (a - b).rem_euclid(360.0);
        d.min(360.0 - d)
    }

    #[test]
    fn empty_input_has_no_stats() {
        assert!(aggregate(&[]).is_none());
    }

    #[test]
    fn incomplete_weather_has_no_stats() {
        let points = vec![point(0.5, None, Some(90.0))];
        assert!(aggregate(&points).is_none());
    }

    #[test]
    fn wraps_bearings_across_north() {
        let points = vec![
            point(0.1, Some((20.0, 40.0, 5.0)), Some(350.0)),
            point(0.2, Some((30.0, 60.0, 7.0)), Some(10.0)),
        ];
        let stats = aggregate(&points).unwrap();
        let dir = stats.mean_wind_direction_deg.unwrap();
        assert!(angular_distance(dir, 0.0) < 1e-6, "got {dir}");
        assert!((0.0..360.0).contains(&dir));
        assert!((stats.mean_temperature - 25.0).abs() < 1e-9);
        assert!((stats.mean_humidity - 50.0).abs() < 1e-9);
        assert!((stats.mean_wind_speed - 6.0).abs() < 1e-9);
        assert_eq!(stats.sample_count, 2);
        assert_eq!(stats.wind_direction_samples, 2);
    }

    #[test]
    fn missing_directions_leave_mean_absent() {
        let points = vec![
            point(0.1, Some((20.0, 40.0, 5.0)), None),
            point(0.2, Some((22.0, 42.0, 3.0)), None),
        ];
        let stats = aggregate(&points).unwrap();
        assert!(stats.mean_wind_direction_deg.is_none());
        assert_eq!(stats.wind_direction_samples, 0);
        assert_eq!(stats.sample_count, 2);
    }

    #[test]
    fn scalar_means_use_complete_samples_only() {
        let mut partial = point(0.3, None, Some(90.0));
        partial.temperature = Some(100.0);
        let points = vec![point(0.1, Some((20.0, 40.0, 5.0)), Some(90.0)), partial];
        let stats = aggregate(&points).unwrap();
        assert!((stats.mean_temperature - 20.0).abs() < 1e-9);
        assert_eq!(stats.sample_count, 1);
        assert_eq!(stats.wind_direction_samples, 2);
        assert!(angular_distance(stats.mean_wind_direction_deg.unwrap(), 90.0) < 1e-6);
    }

    #[test]
    fn opposing_bearings_have_no_mean() {
        assert!(circular_mean_deg(&[0.0, 180.0]).is_none());
        assert!(circular_mean_deg(&[]).is_none());
    }

    #[test]
    fn circular_mean_of_quadrant() {
        let mean = circular_mean_deg(&[270.0, 360.0]).unwrap();
        assert!(angular_distance(mean, 315.0) < 1e-6, "got {mean}");
    }

    #[test]
    fn normalizes_into_range() {
        assert!((normalize_deg(-90.0) - 270.0).abs() < 1e-9);
        assert!(normalize_deg(720.0).abs() < 1e-9);
        assert!(normalize_deg(-1e-20) < 360.0);
    }

    #[test]
    fn top_n_orders_by_risk() {
        let points = vec![point(0.9, None, None), point(0.5, None, None), point(0.2, None, None)];
        let top = top_n(&points, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].risk, Some(0.9));
        assert_eq!(top[1].risk, Some(0.5));
    }

    #[test]
    fn top_n_is_stable_for_ties() {
        let mut first = point(0.5, None, None);
        first.aoi_id = "first".to_string();
        let mut second = point(0.5, None, None);
        second.aoi_id = "second".to_string();
        let top = top_n(&[point(0.1, None, None), first, second], 3);
        assert_eq!(top[0].aoi_id, "first");
        assert_eq!(top[1].aoi_id, "second");
    }

    #[test]
    fn compass_labels() {
        assert_eq!(compass_label(Some(0.0)), "N, 0°");
        assert_eq!(compass_label(Some(45.0)), "NE, 45°");
        assert_eq!(compass_label(Some(350.0)), "N, 350°");
        assert_eq!(compass_label(Some(200.0)), "S, 200°");
        assert_eq!(compass_label(None), "-");
        assert_eq!(compass_label(Some(f64::NAN)), "-");
    }
}
