use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Acceptance bounds and scoring weights for candidate shapes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectionConfig {
    /// Contour area bounds, px²
    pub min_area: f64,
    pub max_area: f64,

    /// 1.0 is a perfect circle; potholes are irregular
    pub min_circularity: f64,
    pub max_circularity: f64,

    /// Bounding-box width / height
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,

    /// Candidates scoring below this are dropped
    pub confidence_threshold: f64,

    /// Confidence scoring weights
    pub weight_area: f64,
    pub weight_circularity: f64,
    pub weight_aspect_ratio: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_area: 500.0,
            max_area: 50_000.0,
            min_circularity: 0.3,
            max_circularity: 0.9,
            min_aspect_ratio: 0.5,
            max_aspect_ratio: 2.0,
            confidence_threshold: 0.7,
            weight_area: 0.4,
            weight_circularity: 0.4,
            weight_aspect_ratio: 0.2,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.min_area >= 0.0 && self.min_area <= self.max_area,
            "area bounds inverted: {} > {}",
            self.min_area,
            self.max_area
        );
        ensure!(
            self.min_circularity >= 0.0 && self.min_circularity <= self.max_circularity,
            "circularity bounds inverted: {} > {}",
            self.min_circularity,
            self.max_circularity
        );
        ensure!(
            self.min_aspect_ratio > 0.0 && self.min_aspect_ratio <= self.max_aspect_ratio,
            "aspect ratio bounds invalid: [{}, {}]",
            self.min_aspect_ratio,
            self.max_aspect_ratio
        );
        ensure!(
            (0.0..=1.0).contains(&self.confidence_threshold),
            "confidence threshold {} outside [0, 1]",
            self.confidence_threshold
        );
        ensure!(
            self.weight_area >= 0.0 && self.weight_circularity >= 0.0 && self.weight_aspect_ratio >= 0.0,
            "scoring weights must be non-negative"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        DetectionConfig::default().validate().unwrap();
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let config = DetectionConfig {
            min_circularity: 0.95,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DetectionConfig {
            confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config: DetectionConfig = serde_json::from_str(r#"{"minArea": 800}"#).unwrap();
        assert_eq!(config.min_area, 800.0);
        assert_eq!(config.max_area, 50_000.0);
        assert_eq!(config.confidence_threshold, 0.7);
    }
}
