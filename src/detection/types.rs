use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixels, as reported by the contour extractor.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl PixelRect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }
}

/// Axis-aligned box with coordinates normalized to the frame, in [0, 1].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct NormalizedBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl NormalizedBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn from_pixels(rect: &PixelRect, frame_width: f64, frame_height: f64) -> Self {
        let norm = |v: f64, extent: f64| {
            if extent > 0.0 {
                (v / extent).clamp(0.0, 1.0)
            } else {
                0.0
            }
        };
        Self {
            x: norm(rect.x, frame_width),
            y: norm(rect.y, frame_height),
            w: norm(rect.w, frame_width),
            h: norm(rect.h, frame_height),
        }
    }

    pub fn area(&self) -> f64 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn intersection_area(&self, other: &NormalizedBox) -> f64 {
        let x_overlap = ((self.x + self.w).min(other.x + other.w) - self.x.max(other.x)).max(0.0);
        let y_overlap = ((self.y + self.h).min(other.y + other.h) - self.y.max(other.y)).max(0.0);
        x_overlap * y_overlap
    }

    /// Intersection over union, in [0, 1]. Two empty boxes have IoU 0.
    pub fn iou(&self, other: &NormalizedBox) -> f64 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            (inter / union).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// One shape from the external contour extractor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RawShape {
    /// Contour area in px².
    pub area: f64,
    /// Closed contour length in px.
    pub perimeter: f64,
    pub bounding_box: PixelRect,
}

/// Everything the contour extractor produced for one frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FrameShapes {
    pub frame_width_px: u32,
    pub frame_height_px: u32,
    pub timestamp_ms: i64,
    pub shapes: Vec<RawShape>,
}

/// A shape that passed the filter. Only the filter constructs these.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectionCandidate {
    bounding_box: NormalizedBox,
    area: f64,
    perimeter: f64,
    circularity: f64,
    aspect_ratio: f64,
    confidence: f64,
    timestamp_ms: i64,
}

impl DetectionCandidate {
    pub(crate) fn new(
        bounding_box: NormalizedBox,
        area: f64,
        perimeter: f64,
        circularity: f64,
        aspect_ratio: f64,
        confidence: f64,
        timestamp_ms: i64,
    ) -> Self {
        Self {
            bounding_box,
            area,
            perimeter,
            circularity,
            aspect_ratio,
            confidence,
            timestamp_ms,
        }
    }

    pub fn bounding_box(&self) -> &NormalizedBox {
        &self.bounding_box
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn perimeter(&self) -> f64 {
        self.perimeter
    }

    pub fn circularity(&self) -> f64 {
        self.circularity
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.aspect_ratio
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    pub fn iou(&self, other: &DetectionCandidate) -> f64 {
        self.bounding_box.iou(&other.bounding_box)
    }
}

#[cfg(test)]
pub(crate) fn candidate_at(x: f64, y: f64, w: f64, h: f64) -> DetectionCandidate {
    DetectionCandidate::new(NormalizedBox::new(x, y, w, h), 25250.0, 727.0, 0.6, 1.0, 0.9, 0)
}
