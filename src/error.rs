//! Error taxonomy for the measurement core.
//!
//! Filter rejections are not part of this enum: a candidate that fails a
//! shape bound is a normal negative outcome (see `detection::Rejection`).

pub type Result<T> = std::result::Result<T, MeasureError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MeasureError {
    /// Malformed camera parameters. Fatal to the call, not the session.
    #[error("invalid geometry input: {0}")]
    InvalidGeometryInput(String),

    /// Tap or action before tracking/sensors are ready.
    #[error("not ready: {0}")]
    NotReady(String),

    #[error("invalid measurement state: {0}")]
    InvalidMeasurementState(String),

    /// A second analysis request while one is still outstanding.
    #[error("analysis already in progress")]
    AnalysisInProgress,

    #[error("analysis service error: {0}")]
    AnalysisServiceError(String),

    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("hardware unavailable: {0}")]
    HardwareUnavailable(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

impl MeasureError {
    /// Terminal errors end the session; the host renders a blocking message.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MeasureError::HardwareUnavailable(_) | MeasureError::PermissionDenied(_)
        )
    }

    /// Errors the user can recover from by retrying or continuing.
    pub fn is_recoverable(&self) -> bool {
        match self {
            MeasureError::NotReady(_)
            | MeasureError::InvalidMeasurementState(_)
            | MeasureError::AnalysisInProgress
            | MeasureError::AnalysisServiceError(_)
            | MeasureError::UnsupportedImage(_) => true,
            MeasureError::InvalidGeometryInput(_)
            | MeasureError::HardwareUnavailable(_)
            | MeasureError::PermissionDenied(_) => false,
        }
    }

    pub(crate) fn state(msg: impl Into<String>) -> Self {
        MeasureError::InvalidMeasurementState(msg.into())
    }

    pub(crate) fn geometry(msg: impl Into<String>) -> Self {
        MeasureError::InvalidGeometryInput(msg.into())
    }
}
