//! Risk score to colour ramp and hotspot classification.
//!
//! The ramp runs green → yellow → red as risk goes 0 → 0.5 → 1 and must
//! stay bit-for-bit stable: legend rendering and map paint expressions
//! both depend on it.

use wildfire_map_risk_models::Rgba;

/// Maps a risk score to its display colour.
///
/// `risk` and `opacity` are clamped into `[0, 1]`; a NaN risk is drawn as
/// zero risk and a NaN opacity as fully opaque.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn color_for(risk: f64, opacity: f64) -> Rgba {
    let risk = if risk.is_nan() { 0.0 } else { risk.clamp(0.0, 1.0) };
    let alpha = if opacity.is_nan() {
        1.0
    } else {
        opacity.clamp(0.0, 1.0)
    };

    // Both channel formulas stay within [0, 255] for clamped input.
    let (red, green) = if risk < 0.5 {
        ((510.0 * risk).round() as u8, 255)
    } else {
        (255, (255.0 * (1.0 - (risk - 0.5) * 2.0)).round() as u8)
    };

    Rgba::new(red, green, 0, alpha)
}

/// Whether a risk score meets the hotspot threshold.
#[must_use]
pub fn is_hotspot(risk: f64, threshold: f64) -> bool {
    risk >= threshold
}
