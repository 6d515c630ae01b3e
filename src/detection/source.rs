use std::collections::VecDeque;

use anyhow::Result;
use chrono::Utc;
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::types::{FrameShapes, PixelRect, RawShape};

/// Supplies the contour extractor's output, one frame per call.
///
/// Production wires in the platform contour extractor; tests use
/// [`ScriptedDetectionSource`].
pub trait DetectionSource: Send + 'static {
    fn next_frame(&mut self) -> Result<FrameShapes>;
}

/// Replays a fixed sequence of frames, then reports empty frames.
pub struct ScriptedDetectionSource {
    frames: VecDeque<FrameShapes>,
    frame_width_px: u32,
    frame_height_px: u32,
    served: usize,
}

impl ScriptedDetectionSource {
    pub fn new(frames: impl IntoIterator<Item = FrameShapes>) -> Self {
        let frames: VecDeque<FrameShapes> = frames.into_iter().collect();
        let (frame_width_px, frame_height_px) = frames
            .front()
            .map(|f| (f.frame_width_px, f.frame_height_px))
            .unwrap_or((1080, 1920));
        Self {
            frames,
            frame_width_px,
            frame_height_px,
            served: 0,
        }
    }

    pub fn served(&self) -> usize {
        self.served
    }
}

impl DetectionSource for ScriptedDetectionSource {
    fn next_frame(&mut self) -> Result<FrameShapes> {
        self.served += 1;
        Ok(self.frames.pop_front().unwrap_or_else(|| FrameShapes {
            frame_width_px: self.frame_width_px,
            frame_height_px: self.frame_height_px,
            timestamp_ms: Utc::now().timestamp_millis(),
            shapes: Vec::new(),
        }))
    }
}

/// Stand-in detector for demos and UI work without a contour extractor:
/// roughly three frames in ten contain one irregular, roughly round shape
/// near the centre of the frame.
pub struct SimulatedDetectionSource {
    rng: StdRng,
    frame_width_px: u32,
    frame_height_px: u32,
    hit_probability: f64,
}

impl SimulatedDetectionSource {
    pub fn new(frame_width_px: u32, frame_height_px: u32) -> Self {
        Self::from_rng(StdRng::from_entropy(), frame_width_px, frame_height_px)
    }

    pub fn with_seed(seed: u64, frame_width_px: u32, frame_height_px: u32) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed), frame_width_px, frame_height_px)
    }

    fn from_rng(rng: StdRng, frame_width_px: u32, frame_height_px: u32) -> Self {
        Self {
            rng,
            frame_width_px,
            frame_height_px,
            hit_probability: 0.3,
        }
    }

    pub fn with_hit_probability(mut self, p: f64) -> Self {
        self.hit_probability = p.clamp(0.0, 1.0);
        self
    }

    fn random_shape(&mut self) -> RawShape {
        let diameter: f64 = self.rng.gen_range(120.0..260.0);
        let circularity: f64 = self.rng.gen_range(0.5..0.8);
        let aspect: f64 = self.rng.gen_range(0.8..1.5);
        let radius = diameter / 2.0;
        let area = std::f64::consts::PI * radius * radius;
        let perimeter = (4.0 * std::f64::consts::PI * area / circularity).sqrt();

        let w = diameter * aspect.sqrt();
        let h = diameter / aspect.sqrt();
        let jitter: f64 = self.rng.gen_range(-10.0..10.0);
        let x = self.frame_width_px as f64 / 2.0 - w / 2.0 + jitter;
        let y = self.frame_height_px as f64 / 2.0 - h / 2.0 + jitter;

        RawShape {
            area,
            perimeter,
            bounding_box: PixelRect::new(x.max(0.0), y.max(0.0), w, h),
        }
    }
}

impl DetectionSource for SimulatedDetectionSource {
    fn next_frame(&mut self) -> Result<FrameShapes> {
        let shapes = if self.rng.gen_bool(self.hit_probability) {
            vec![self.random_shape()]
        } else {
            Vec::new()
        };
        Ok(FrameShapes {
            frame_width_px: self.frame_width_px,
            frame_height_px: self.frame_height_px,
            timestamp_ms: Utc::now().timestamp_millis(),
            shapes,
        })
    }
}
