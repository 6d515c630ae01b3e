use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::watch;

use crate::detection::{CandidateFilter, DetectionCandidate, DetectionSource};
use crate::geometry::{CameraFrameContext, CameraIntrinsics, DistanceSource};
use crate::session::result::derive_area_m2;
use crate::stabilizer::TemporalStabilizer;

use super::motion::MotionState;

/// A stabilized detection, sized with the camera state of the frame that
/// confirmed it.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedDetection {
    pub candidate: DetectionCandidate,
    pub width_cm: f64,
    pub height_cm: f64,
    pub area_m2: f64,
    pub distance_to_plane_m: f64,
    pub distance_source: DistanceSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Unconfirmed { accepted: usize },
    Confirmed(ConfirmedDetection),
}

/// One frame cycle: extract → filter → stabilize → size.
pub struct FramePipeline<S: DetectionSource> {
    source: S,
    filter: CandidateFilter,
    stabilizer: TemporalStabilizer,
    camera: watch::Receiver<CameraFrameContext>,
    motion: Option<(watch::Receiver<MotionState>, f64)>,
    frames_processed: u64,
}

impl<S: DetectionSource> FramePipeline<S> {
    pub fn new(
        source: S,
        filter: CandidateFilter,
        stabilizer: TemporalStabilizer,
        camera: watch::Receiver<CameraFrameContext>,
    ) -> Self {
        Self {
            source,
            filter,
            stabilizer,
            camera,
            motion: None,
            frames_processed: 0,
        }
    }

    /// Size confirmations with the newest tilt sample, converted to a
    /// distance for a device held `device_height_m` above the ground.
    pub fn with_motion(mut self, motion: watch::Receiver<MotionState>, device_height_m: f64) -> Self {
        self.motion = Some((motion, device_height_m));
        self
    }

    pub fn process_next(&mut self) -> Result<FrameOutcome> {
        let frame = self
            .source
            .next_frame()
            .context("detection source failed to produce a frame")?;
        self.frames_processed += 1;

        let candidates = self.filter.filter_frame(&frame);
        let accepted = candidates.len();

        match self.stabilizer.push_frame(candidates) {
            Some(candidate) => {
                let camera = self.current_camera();
                Ok(FrameOutcome::Confirmed(size_detection(candidate, &camera)))
            }
            None => Ok(FrameOutcome::Unconfirmed { accepted }),
        }
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    fn current_camera(&self) -> CameraFrameContext {
        let mut camera = self.camera.borrow().clone();
        if let Some((motion, device_height_m)) = &self.motion {
            if let Some(tilt) = motion.borrow().tilt_degrees {
                camera.set_tilt(tilt, *device_height_m);
            }
        }
        camera
    }
}

pub fn size_detection(candidate: DetectionCandidate, camera: &CameraFrameContext) -> ConfirmedDetection {
    let intrinsics = CameraIntrinsics::from_context(camera);
    let distance = camera.distance_to_plane_m();
    let (width_cm, height_cm) = intrinsics.real_world_size_cm(candidate.bounding_box(), distance);
    let area_m2 = derive_area_m2(Some(width_cm), None).unwrap_or(0.0);
    ConfirmedDetection {
        candidate,
        width_cm,
        height_cm,
        area_m2,
        distance_to_plane_m: distance,
        distance_source: camera.distance_source(),
    }
}
