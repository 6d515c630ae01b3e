use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::MeasurementMode;

/// Finalized measurement handed to the host on save.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementReport {
    pub session_id: Uuid,
    pub mode: MeasurementMode,
    pub depth_cm: Option<f64>,
    pub width_cm: Option<f64>,
    pub area_m2: Option<f64>,
    pub confidence: Option<f64>,
    pub description: Option<String>,
    pub measured_at: DateTime<Utc>,
}

/// Receives saved reports. Storage and transport live with the host.
pub trait ReportSink: Send + Sync + 'static {
    fn submit(&self, report: MeasurementReport) -> anyhow::Result<()>;
}
