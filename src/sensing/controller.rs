use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::detection::{CandidateFilter, DetectionSource};
use crate::geometry::CameraFrameContext;
use crate::settings::MeasurementSettings;
use crate::stabilizer::TemporalStabilizer;

use super::loop_worker::{detection_loop, LoopStats, EVENT_BUFFER};
use super::motion::MotionState;
use super::pipeline::{ConfirmedDetection, FramePipeline};

/// Owns the automatic-detection loop for one measurement flow.
pub struct DetectionController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    stats: Arc<LoopStats>,
}

impl Default for DetectionController {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
            stats: Arc::new(LoopStats::default()),
        }
    }

    /// Spawn the loop. Confirmed detections arrive on the returned channel.
    pub fn start_detection<S: DetectionSource>(
        &mut self,
        source: S,
        settings: &MeasurementSettings,
        camera: watch::Receiver<CameraFrameContext>,
        motion: watch::Receiver<MotionState>,
    ) -> Result<mpsc::Receiver<ConfirmedDetection>> {
        if self.handle.is_some() {
            bail!("automatic detection already active");
        }
        settings.validate().context("refusing to start detection")?;

        info!(
            "Starting automatic detection every {}ms",
            settings.pipeline.processing_interval_ms
        );

        let pipeline = FramePipeline::new(
            source,
            CandidateFilter::new(settings.detection.clone()),
            TemporalStabilizer::new(&settings.stabilizer),
            camera,
        )
        .with_motion(motion.clone(), settings.camera.device_height_m);

        let cancel_token = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        self.stats = Arc::new(LoopStats::default());

        let handle = tokio::spawn(detection_loop(
            Arc::new(Mutex::new(pipeline)),
            settings.pipeline.clone(),
            motion,
            events_tx,
            self.stats.clone(),
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(events_rx)
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn stats(&self) -> Arc<LoopStats> {
        self.stats.clone()
    }

    /// Cancel the timer and wait for the loop to exit. Any frame cycle still
    /// in flight is discarded.
    pub async fn stop_detection(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("detection loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}
