use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisResult, CapturedImage};
use crate::error::{MeasureError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisPhase {
    Capturing,
    Captured,
    Analyzing,
    Reviewing,
}

/// Identifies one outstanding analysis request. A result is applied only if
/// its ticket is still the one the flow is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisTicket(u64);

/// Photo → external analysis → review.
#[derive(Debug, Clone)]
pub struct AnalysisFlow {
    phase: AnalysisPhase,
    image: Option<CapturedImage>,
    result: Option<AnalysisResult>,
    last_error: Option<String>,
    generation: u64,
    pending: Option<AnalysisTicket>,
}

impl Default for AnalysisFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisFlow {
    pub fn new() -> Self {
        Self {
            phase: AnalysisPhase::Capturing,
            image: None,
            result: None,
            last_error: None,
            generation: 0,
            pending: None,
        }
    }

    pub fn phase(&self) -> AnalysisPhase {
        self.phase
    }

    pub fn image(&self) -> Option<&CapturedImage> {
        self.image.as_ref()
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    /// Message of the most recent failed analysis, cleared on the next attempt.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// Store a photo. Capturing again before analysis replaces the photo.
    pub fn capture(&mut self, image: CapturedImage) -> Result<()> {
        match self.phase {
            AnalysisPhase::Capturing | AnalysisPhase::Captured => {
                debug!(
                    "analysis photo captured ({}, {}x{})",
                    image.mime_type(),
                    image.dimensions().0,
                    image.dimensions().1
                );
                self.image = Some(image);
                self.last_error = None;
                self.phase = AnalysisPhase::Captured;
                Ok(())
            }
            AnalysisPhase::Analyzing => Err(MeasureError::AnalysisInProgress),
            AnalysisPhase::Reviewing => Err(MeasureError::state(
                "retake before capturing a new photo",
            )),
        }
    }

    /// Hand out the single ticket for the captured photo.
    pub fn begin(&mut self) -> Result<(AnalysisTicket, CapturedImage)> {
        match self.phase {
            AnalysisPhase::Analyzing => Err(MeasureError::AnalysisInProgress),
            AnalysisPhase::Captured => {
                let image = self
                    .image
                    .clone()
                    .ok_or_else(|| MeasureError::state("no photo captured"))?;
                self.generation += 1;
                let ticket = AnalysisTicket(self.generation);
                self.pending = Some(ticket);
                self.last_error = None;
                self.phase = AnalysisPhase::Analyzing;
                debug!("analysis request {} issued", self.generation);
                Ok((ticket, image))
            }
            AnalysisPhase::Capturing => Err(MeasureError::state("capture a photo first")),
            AnalysisPhase::Reviewing => Err(MeasureError::state("result already under review")),
        }
    }

    /// Apply a finished request. Returns false when the ticket is stale
    /// (the flow was reset, retaken or cancelled meanwhile).
    pub fn complete(
        &mut self,
        ticket: AnalysisTicket,
        outcome: Result<AnalysisResult>,
    ) -> bool {
        if self.pending != Some(ticket) {
            info!("discarding stale analysis result {}", ticket.0);
            return false;
        }
        self.pending = None;

        match outcome {
            Ok(result) => {
                self.result = Some(result);
                self.phase = AnalysisPhase::Reviewing;
            }
            Err(err) => {
                warn!("analysis failed, photo kept for retry: {err}");
                self.last_error = Some(err.to_string());
                self.phase = AnalysisPhase::Captured;
            }
        }
        true
    }

    /// Drop the photo and any result and go back to the camera.
    pub fn retake(&mut self) {
        self.invalidate();
        self.image = None;
        self.result = None;
        self.last_error = None;
        self.phase = AnalysisPhase::Capturing;
    }

    /// Orphan any outstanding ticket.
    pub fn invalidate(&mut self) {
        if self.pending.take().is_some() {
            debug!("outstanding analysis request {} abandoned", self.generation);
        }
        self.generation += 1;
    }
}
