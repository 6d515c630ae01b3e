use serde::{Deserialize, Serialize};

use super::mode::MeasurementAxis;

/// Circle-area heuristic: the defect is treated as a disc whose diameter is
/// the width, or the depth when no width was measured.
pub fn derive_area_m2(width_cm: Option<f64>, depth_cm: Option<f64>) -> Option<f64> {
    let diameter_cm = width_cm.or(depth_cm).filter(|d| d.is_finite())?;
    let radius_cm = diameter_cm / 2.0;
    Some(std::f64::consts::PI * radius_cm * radius_cm / 10_000.0)
}

/// An explicit area (from the analysis service) wins over the heuristic.
pub fn resolve_area_m2(
    width_cm: Option<f64>,
    depth_cm: Option<f64>,
    explicit_area_m2: Option<f64>,
) -> Option<f64> {
    explicit_area_m2
        .filter(|a| a.is_finite() && *a > 0.0)
        .or_else(|| derive_area_m2(width_cm, depth_cm))
}

/// The values a session has collected so far.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementValues {
    pub depth_cm: Option<f64>,
    pub width_cm: Option<f64>,
    pub area_m2: Option<f64>,
    pub confidence: Option<f64>,
    pub description: Option<String>,
}

impl MeasurementValues {
    /// Record a tap measurement and recompute the derived area.
    pub fn record(&mut self, axis: MeasurementAxis, value_cm: f64) {
        match axis {
            MeasurementAxis::Depth => self.depth_cm = Some(value_cm),
            MeasurementAxis::Width => self.width_cm = Some(value_cm),
        }
        self.area_m2 = derive_area_m2(self.width_cm, self.depth_cm);
    }

    pub fn get(&self, axis: MeasurementAxis) -> Option<f64> {
        match axis {
            MeasurementAxis::Depth => self.depth_cm,
            MeasurementAxis::Width => self.width_cm,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.depth_cm.is_none() && self.width_cm.is_none() && self.area_m2.is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
