use super::config::DetectionConfig;

/// Shape regularity: 4π·area / perimeter², 1.0 for a perfect circle.
/// A zero (or non-finite) perimeter yields 0 rather than a division error.
pub fn circularity(area: f64, perimeter: f64) -> f64 {
    if !(perimeter > 0.0) || !perimeter.is_finite() {
        return 0.0;
    }
    let c = 4.0 * std::f64::consts::PI * area / (perimeter * perimeter);
    if c.is_finite() {
        c.max(0.0)
    } else {
        0.0
    }
}

/// How close `x` is to the middle of `[lo, hi]`, in [0, 1].
pub fn score_against_midpoint(x: f64, lo: f64, hi: f64) -> f64 {
    let mid = (lo + hi) / 2.0;
    if !(mid > 0.0) || !x.is_finite() {
        return 0.0;
    }
    (1.0 - (x - mid).abs() / mid).clamp(0.0, 1.0)
}

/// Per-dimension scores and their weighted blend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeScore {
    pub area: f64,
    pub circularity: f64,
    pub aspect_ratio: f64,
    pub confidence: f64,
}

/// Weighted average of the three shape scores, clamped to [0, 1].
pub fn compute_confidence(
    area: f64,
    circularity: f64,
    aspect_ratio: f64,
    config: &DetectionConfig,
) -> ShapeScore {
    let area_score = score_against_midpoint(area, config.min_area, config.max_area);
    let circularity_score =
        score_against_midpoint(circularity, config.min_circularity, config.max_circularity);
    let aspect_score =
        score_against_midpoint(aspect_ratio, config.min_aspect_ratio, config.max_aspect_ratio);

    let confidence = config.weight_area * area_score
        + config.weight_circularity * circularity_score
        + config.weight_aspect_ratio * aspect_score;

    ShapeScore {
        area: area_score,
        circularity: circularity_score,
        aspect_ratio: aspect_score,
        confidence: if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        },
    }
}
