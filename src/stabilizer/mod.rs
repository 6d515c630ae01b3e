//! Cross-frame confirmation of noisy per-frame detections.
//!
//! A detection is confirmed only when the last `required_consecutive` frames
//! each contain a candidate overlapping the previous frame's candidate.

pub mod window;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::detection::DetectionCandidate;

pub use window::StabilizationWindow;

const ENABLE_LOGS: bool = true;

use crate::log_debug;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StabilizerConfig {
    pub required_consecutive: usize,
    pub max_history: usize,
    /// Frame-to-frame overlap must strictly exceed this
    pub iou_threshold: f64,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            required_consecutive: 3,
            max_history: 5,
            iou_threshold: 0.5,
        }
    }
}

impl StabilizerConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.required_consecutive >= 1, "required_consecutive must be at least 1");
        ensure!(
            self.max_history >= self.required_consecutive,
            "max_history ({}) must hold required_consecutive ({}) frames",
            self.max_history,
            self.required_consecutive
        );
        ensure!(
            (0.0..1.0).contains(&self.iou_threshold),
            "iou_threshold {} outside [0, 1)",
            self.iou_threshold
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TemporalStabilizer {
    window: StabilizationWindow,
    required_consecutive: usize,
    iou_threshold: f64,
}

impl Default for TemporalStabilizer {
    fn default() -> Self {
        Self::new(&StabilizerConfig::default())
    }
}

impl TemporalStabilizer {
    pub fn new(config: &StabilizerConfig) -> Self {
        let required_consecutive = config.required_consecutive.max(1);
        Self {
            window: StabilizationWindow::new(config.max_history.max(required_consecutive)),
            required_consecutive,
            iou_threshold: config.iou_threshold,
        }
    }

    /// Record one frame's candidates. Returns the confirmed detection, if
    /// this frame completes a consistent run; the window is then cleared.
    pub fn push_frame(&mut self, candidates: Vec<DetectionCandidate>) -> Option<DetectionCandidate> {
        self.window.push(candidates);

        if self.window.len() < self.required_consecutive {
            return None;
        }

        let run: Vec<&Vec<DetectionCandidate>> =
            self.window.recent(self.required_consecutive).collect();
        if run.iter().any(|frame| frame.is_empty()) {
            return None;
        }

        let (first, rest) = run.split_first()?;
        let confirmed = first
            .iter()
            .find(|candidate| self.chain_exists(candidate, rest))
            .cloned();

        if let Some(candidate) = &confirmed {
            log_debug!(
                "detection confirmed over {} frames (confidence {:.2})",
                self.required_consecutive,
                candidate.confidence()
            );
            self.window.clear();
        }
        confirmed
    }

    /// Depth-first search for one candidate per remaining frame, each
    /// overlapping the one chosen in the frame before.
    fn chain_exists(&self, previous: &DetectionCandidate, rest: &[&Vec<DetectionCandidate>]) -> bool {
        let Some((next_frame, remaining)) = rest.split_first() else {
            return true;
        };
        next_frame.iter().any(|current| {
            previous.iou(current) > self.iou_threshold && self.chain_exists(current, remaining)
        })
    }

    pub fn frames_recorded(&self) -> usize {
        self.window.len()
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::candidate_at;

    fn frame(boxes: &[(f64, f64)]) -> Vec<DetectionCandidate> {
        boxes
            .iter()
            .map(|&(x, y)| candidate_at(x, y, 0.2, 0.2))
            .collect()
    }

    #[test]
    fn unconfirmed_until_enough_frames() {
        let mut stabilizer = TemporalStabilizer::default();
        assert!(stabilizer.push_frame(frame(&[(0.4, 0.4)])).is_none());
        assert!(stabilizer.push_frame(frame(&[(0.4, 0.4)])).is_none());
        assert_eq!(stabilizer.frames_recorded(), 2);
    }

    #[test]
    fn confirms_consistent_detection_and_clears_window() {
        let mut stabilizer = TemporalStabilizer::default();
        stabilizer.push_frame(frame(&[(0.40, 0.40)]));
        stabilizer.push_frame(frame(&[(0.41, 0.40)]));
        let confirmed = stabilizer
            .push_frame(frame(&[(0.42, 0.41)]))
            .expect("three overlapping frames");
        assert_eq!(confirmed.bounding_box().x, 0.40);
        assert_eq!(stabilizer.frames_recorded(), 0);
    }

    #[test]
    fn empty_frame_inside_run_blocks_confirmation() {
        let mut stabilizer = TemporalStabilizer::default();
        stabilizer.push_frame(frame(&[(0.4, 0.4)]));
        stabilizer.push_frame(Vec::new());
        assert!(stabilizer.push_frame(frame(&[(0.4, 0.4)])).is_none());
        assert!(stabilizer.push_frame(frame(&[(0.4, 0.4)])).is_none());
        // the empty frame has now left the run
        assert!(stabilizer.push_frame(frame(&[(0.4, 0.4)])).is_some());
    }

    #[test]
    fn disjoint_detections_are_not_confirmed() {
        let mut stabilizer = TemporalStabilizer::default();
        stabilizer.push_frame(frame(&[(0.1, 0.1)]));
        stabilizer.push_frame(frame(&[(0.6, 0.6)]));
        assert!(stabilizer.push_frame(frame(&[(0.1, 0.1)])).is_none());
        assert_eq!(stabilizer.frames_recorded(), 3);
    }

    #[test]
    fn chain_may_pass_through_a_second_candidate() {
        let mut stabilizer = TemporalStabilizer::default();
        stabilizer.push_frame(frame(&[(0.0, 0.0), (0.5, 0.5)]));
        stabilizer.push_frame(frame(&[(0.7, 0.0), (0.52, 0.5)]));
        let confirmed = stabilizer
            .push_frame(frame(&[(0.54, 0.5)]))
            .expect("second candidate forms a chain");
        assert_eq!(confirmed.bounding_box().x, 0.5);
    }

    #[test]
    fn window_is_bounded() {
        let mut stabilizer = TemporalStabilizer::default();
        for i in 0..10 {
            let x = if i % 2 == 0 { 0.0 } else { 0.7 };
            stabilizer.push_frame(frame(&[(x, 0.0)]));
        }
        assert_eq!(stabilizer.frames_recorded(), 5);
        stabilizer.reset();
        assert_eq!(stabilizer.frames_recorded(), 0);
    }

    #[test]
    fn config_validation() {
        StabilizerConfig::default().validate().unwrap();
        let bad = StabilizerConfig {
            required_consecutive: 6,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
