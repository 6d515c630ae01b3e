//! Contract with the external image-analysis service.
//!
//! The core never looks at pixels: it hands over an encoded photo and maps
//! whatever comes back to measurements.

use std::future::Future;

use serde::{Deserialize, Serialize};

pub mod capture;
pub mod parse;

pub use capture::CapturedImage;
pub use parse::parse_analysis_text;

/// Measurements reported by the service, in cm (area in m²). Every field is
/// optional: services routinely return only some of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub depth: Option<f64>,
    pub area: Option<f64>,
    pub confidence: Option<f64>,
    pub description: Option<String>,
}

impl AnalysisResult {
    /// Depth as the session records it; services that only report a height
    /// mean the same thing.
    pub fn depth_cm(&self) -> Option<f64> {
        self.depth.or(self.height)
    }

    pub fn has_measurements(&self) -> bool {
        self.width.is_some() || self.depth_cm().is_some() || self.area.is_some()
    }
}

/// The external service. Timeouts and retries are the implementation's
/// business; the session only sees success or failure.
pub trait AnalysisService: Send + Sync + 'static {
    fn analyze(
        &self,
        image: &CapturedImage,
    ) -> impl Future<Output = anyhow::Result<AnalysisResult>> + Send;
}
