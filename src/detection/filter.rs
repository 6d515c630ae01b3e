use serde::Serialize;

use super::config::DetectionConfig;
use super::scoring::{circularity, compute_confidence};
use super::types::{DetectionCandidate, FrameShapes, NormalizedBox, RawShape};

// Set to true to log every rejected shape
const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Why a shape was not accepted. A normal outcome, not an error.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "reason")]
pub enum Rejection {
    Area { area: f64 },
    AspectRatio { aspect_ratio: f64 },
    ZeroPerimeter,
    Circularity { circularity: f64 },
    LowConfidence { confidence: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    Accepted(DetectionCandidate),
    Rejected(Rejection),
}

impl FilterOutcome {
    pub fn accepted(self) -> Option<DetectionCandidate> {
        match self {
            FilterOutcome::Accepted(c) => Some(c),
            FilterOutcome::Rejected(_) => None,
        }
    }
}

/// Scores raw contour shapes and keeps the plausible defects.
#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    config: DetectionConfig,
}

impl CandidateFilter {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: DetectionConfig) {
        self.config = config;
    }

    pub fn evaluate(
        &self,
        shape: &RawShape,
        frame_width_px: u32,
        frame_height_px: u32,
        timestamp_ms: i64,
    ) -> FilterOutcome {
        let cfg = &self.config;

        let area = shape.area;
        if !(area >= cfg.min_area && area <= cfg.max_area) {
            return FilterOutcome::Rejected(Rejection::Area { area });
        }

        let rect = &shape.bounding_box;
        let aspect_ratio = if rect.h > 0.0 { rect.w / rect.h } else { f64::INFINITY };
        if !(aspect_ratio >= cfg.min_aspect_ratio && aspect_ratio <= cfg.max_aspect_ratio) {
            return FilterOutcome::Rejected(Rejection::AspectRatio { aspect_ratio });
        }

        if !(shape.perimeter > 0.0) {
            return FilterOutcome::Rejected(Rejection::ZeroPerimeter);
        }
        let circularity = circularity(area, shape.perimeter);
        if !(circularity >= cfg.min_circularity && circularity <= cfg.max_circularity) {
            return FilterOutcome::Rejected(Rejection::Circularity { circularity });
        }

        let score = compute_confidence(area, circularity, aspect_ratio, cfg);
        if score.confidence < cfg.confidence_threshold {
            return FilterOutcome::Rejected(Rejection::LowConfidence {
                confidence: score.confidence,
            });
        }

        FilterOutcome::Accepted(DetectionCandidate::new(
            NormalizedBox::from_pixels(rect, frame_width_px as f64, frame_height_px as f64),
            area,
            shape.perimeter,
            circularity,
            aspect_ratio,
            score.confidence,
            timestamp_ms,
        ))
    }

    /// Filter every shape of a frame. Rejections never abort the frame.
    pub fn filter_frame(&self, frame: &FrameShapes) -> Vec<DetectionCandidate> {
        frame
            .shapes
            .iter()
            .filter_map(|shape| {
                match self.evaluate(
                    shape,
                    frame.frame_width_px,
                    frame.frame_height_px,
                    frame.timestamp_ms,
                ) {
                    FilterOutcome::Accepted(candidate) => Some(candidate),
                    FilterOutcome::Rejected(reason) => {
                        log_debug!("shape rejected at {}ms: {:?}", frame.timestamp_ms, reason);
                        None
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) fn ideal_shape(x: f64, y: f64) -> RawShape {
    // area at the midpoint of the default range, circularity 0.6, aspect 1.25
    let area = 25_250.0;
    let perimeter = (4.0 * std::f64::consts::PI * area / 0.6).sqrt();
    RawShape {
        area,
        perimeter,
        bounding_box: super::types::PixelRect::new(x, y, 200.0, 160.0),
    }
}
