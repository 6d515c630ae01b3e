use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info};
use tokio::{sync::Mutex, task::JoinHandle};

use crate::analysis::{AnalysisService, CapturedImage};
use crate::error::MeasureError;
use crate::report::{MeasurementReport, ReportSink};

use super::state::MeasurementSession;

/// Drives one session against its collaborators: runs the analysis request
/// in the background and hands saved reports to the sink.
pub struct MeasurementController<A: AnalysisService, R: ReportSink> {
    session: Arc<Mutex<MeasurementSession>>,
    analysis: Arc<A>,
    sink: Arc<R>,
    analysis_task: Mutex<Option<JoinHandle<()>>>,
}

impl<A: AnalysisService, R: ReportSink> MeasurementController<A, R> {
    pub fn new(session: MeasurementSession, analysis: A, sink: R) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            analysis: Arc::new(analysis),
            sink: Arc::new(sink),
            analysis_task: Mutex::new(None),
        }
    }

    /// Shared handle for taps, sensor updates and state queries.
    pub fn session(&self) -> Arc<Mutex<MeasurementSession>> {
        self.session.clone()
    }

    /// Store a photo for analysis. Like `request_analysis`, returns
    /// `Ok(false)` and drops the photo while a request is outstanding.
    pub async fn capture(&self, bytes: Vec<u8>) -> Result<bool> {
        let image = CapturedImage::from_bytes(bytes)?;
        match self.session.lock().await.capture(image) {
            Ok(()) => Ok(true),
            Err(MeasureError::AnalysisInProgress) => {
                debug!("analysis in flight, ignoring capture");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Send the captured photo for analysis. Returns `Ok(false)` when a
    /// request is already outstanding; the duplicate is dropped.
    pub async fn request_analysis(&self) -> Result<bool> {
        let (ticket, image) = {
            let mut session = self.session.lock().await;
            match session.begin_analysis() {
                Ok(started) => started,
                Err(MeasureError::AnalysisInProgress) => {
                    debug!("analysis already in flight, ignoring request");
                    return Ok(false);
                }
                Err(err) => return Err(err.into()),
            }
        };

        let session = self.session.clone();
        let service = self.analysis.clone();
        let handle = tokio::spawn(async move {
            let outcome = match service.analyze(&image).await {
                Ok(result) if result.has_measurements() => Ok(result),
                Ok(_) => Err(MeasureError::AnalysisServiceError(
                    "reply contained no measurements".into(),
                )),
                Err(err) => Err(MeasureError::AnalysisServiceError(format!("{err:#}"))),
            };
            session.lock().await.complete_analysis(ticket, outcome);
        });

        if let Some(previous) = self.analysis_task.lock().await.replace(handle) {
            previous.abort();
        }
        Ok(true)
    }

    /// Wait for the outstanding analysis request, if any, to settle.
    pub async fn join_analysis(&self) -> Result<()> {
        let handle = self.analysis_task.lock().await.take();
        match handle {
            Some(handle) => match handle.await {
                Ok(()) => Ok(()),
                Err(err) if err.is_cancelled() => Ok(()),
                Err(err) => Err(err).context("analysis task failed"),
            },
            None => Ok(()),
        }
    }

    /// Deliver the session's result to the sink. The session only resets
    /// once the sink has accepted it.
    pub async fn save(&self) -> Result<MeasurementReport> {
        let mut session = self.session.lock().await;
        let report = session.report()?;
        self.sink
            .submit(report.clone())
            .context("report sink rejected the measurement")?;
        session.mark_saved();
        Ok(report)
    }

    pub async fn reset(&self) {
        self.abort_analysis().await;
        self.session.lock().await.reset();
    }

    /// Close the session. An analysis request still running is aborted and
    /// its result, should it arrive, is discarded.
    pub async fn cancel(&self) {
        self.abort_analysis().await;
        self.session.lock().await.cancel();
        info!("measurement cancelled");
    }

    async fn abort_analysis(&self) {
        if let Some(handle) = self.analysis_task.lock().await.take() {
            handle.abort();
        }
    }
}
