//! Measurement core for sizing road-surface defects.
//!
//! Turns AR taps, screen taps, tilt readings, per-frame shape candidates and
//! external image-analysis replies into a depth/width/area measurement. The
//! host application owns the camera, the UI and report storage.

pub mod analysis;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod report;
pub mod sensing;
pub mod session;
pub mod settings;
pub mod stabilizer;
pub mod utils;

pub use error::{MeasureError, Result};

/// Install the `env_logger` backend. Safe to call when the host already has
/// a logger; the existing one is kept.
pub fn init_logging() {
    let installed = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init()
        .is_ok();

    if installed {
        log::info!("roadgauge {} logging initialised", env!("CARGO_PKG_VERSION"));
    }
}
