pub mod config;
pub mod filter;
pub mod scoring;
pub mod source;
pub mod types;

pub use config::DetectionConfig;
pub use filter::{CandidateFilter, FilterOutcome, Rejection};
pub use scoring::{circularity, compute_confidence, score_against_midpoint, ShapeScore};
pub use source::{DetectionSource, ScriptedDetectionSource, SimulatedDetectionSource};
pub use types::{DetectionCandidate, FrameShapes, NormalizedBox, PixelRect, RawShape};
