//! Automatic-detection pipeline: a fixed-interval timer drives one frame
//! cycle at a time through extraction, filtering and stabilization.

pub mod controller;
pub mod loop_worker;
pub mod motion;
pub mod pipeline;

pub use controller::DetectionController;
pub use loop_worker::LoopStats;
pub use motion::{MotionLevel, MotionMonitor, MotionState};
pub use pipeline::{size_detection, ConfirmedDetection, FrameOutcome, FramePipeline};
