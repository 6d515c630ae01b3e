use serde::{Deserialize, Serialize};

use crate::geometry::{ScreenPoint, WorldPoint};

/// How the two measurement points (or the whole measurement) are acquired.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum MeasurementMode {
    /// Two taps hit-tested against a tracked AR plane.
    ArTap,
    /// Two taps on the live camera feed, sized with the best distance estimate.
    ScreenTap,
    /// Two taps on the live feed, sized with the tilt-derived distance only.
    SensorTap,
    /// One photo sent to the external image-analysis service.
    AiAnalysis,
}

impl MeasurementMode {
    pub fn is_manual(self) -> bool {
        !matches!(self, MeasurementMode::AiAnalysis)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum MeasurementAxis {
    #[default]
    Depth,
    Width,
}

/// A tap as delivered by the host: AR modes resolve it to a world point,
/// camera-feed modes pass the raw screen position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum TapPoint {
    World(WorldPoint),
    Screen(ScreenPoint),
}

impl From<WorldPoint> for TapPoint {
    fn from(point: WorldPoint) -> Self {
        TapPoint::World(point)
    }
}

impl From<ScreenPoint> for TapPoint {
    fn from(point: ScreenPoint) -> Self {
        TapPoint::Screen(point)
    }
}
