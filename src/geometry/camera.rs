use serde::{Deserialize, Serialize};

use crate::error::{MeasureError, Result};

pub const DEFAULT_DISTANCE_TO_PLANE_M: f64 = 1.5;
pub const MIN_DISTANCE_TO_PLANE_M: f64 = 0.3;
pub const MAX_DISTANCE_TO_PLANE_M: f64 = 4.0;

/// Tilt angles outside this open range are too flat or too steep to trust.
const MIN_TRUSTED_TILT_DEG: f64 = 6.0;
const MAX_TRUSTED_TILT_DEG: f64 = 80.0;
const MIN_TILT_DISTANCE_M: f64 = 0.5;
const MAX_TILT_DISTANCE_M: f64 = 3.0;
const TILT_FALLBACK_DISTANCE_M: f64 = 1.5;

/// Focal length in pixels for a horizontal field of view.
pub fn focal_length_pixels(screen_width_px: f64, fov_degrees: f64) -> Result<f64> {
    if !(screen_width_px > 0.0) || !screen_width_px.is_finite() {
        return Err(MeasureError::geometry(format!(
            "screen width must be positive, got {screen_width_px}"
        )));
    }
    if !(fov_degrees > 0.0 && fov_degrees < 180.0) {
        return Err(MeasureError::geometry(format!(
            "field of view must be within (0, 180) degrees, got {fov_degrees}"
        )));
    }
    Ok(screen_width_px / (2.0 * (fov_degrees * std::f64::consts::PI / 360.0).tan()))
}

/// Real-world length in centimeters of `pixel_distance` seen at
/// `distance_to_plane_m`. Linear in the distance.
pub fn pixel_distance_to_real(
    pixel_distance: f64,
    focal_length_pixels: f64,
    distance_to_plane_m: f64,
) -> f64 {
    (pixel_distance / focal_length_pixels) * distance_to_plane_m * 100.0
}

/// Camera-to-ground distance from device tilt, assuming the device is held
/// `device_height_m` above the ground.
pub fn estimate_distance_from_tilt(tilt_angle_degrees: f64, device_height_m: f64) -> f64 {
    if !(tilt_angle_degrees > MIN_TRUSTED_TILT_DEG && tilt_angle_degrees < MAX_TRUSTED_TILT_DEG) {
        return TILT_FALLBACK_DISTANCE_M;
    }
    let distance = device_height_m / tilt_angle_degrees.to_radians().cos();
    if distance.is_nan() {
        return TILT_FALLBACK_DISTANCE_M;
    }
    distance.clamp(MIN_TILT_DISTANCE_M, MAX_TILT_DISTANCE_M)
}

/// Where the current distance-to-plane estimate came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DistanceSource {
    ArHitTest,
    SensorTilt,
    Default,
}

/// Per-frame camera parameters plus the best available distance to the
/// subject plane.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CameraFrameContext {
    screen_width_px: u32,
    screen_height_px: u32,
    fov_degrees: f64,
    focal_length_px: f64,
    ar_distance_m: Option<f64>,
    tilt_distance_m: Option<f64>,
    default_distance_m: f64,
}

impl CameraFrameContext {
    pub fn new(screen_width_px: u32, screen_height_px: u32, fov_degrees: f64) -> Result<Self> {
        if screen_height_px == 0 {
            return Err(MeasureError::geometry("screen height must be positive"));
        }
        let focal_length_px = focal_length_pixels(screen_width_px as f64, fov_degrees)?;
        Ok(Self {
            screen_width_px,
            screen_height_px,
            fov_degrees,
            focal_length_px,
            ar_distance_m: None,
            tilt_distance_m: None,
            default_distance_m: DEFAULT_DISTANCE_TO_PLANE_M,
        })
    }

    pub fn with_default_distance(mut self, default_distance_m: f64) -> Self {
        if default_distance_m.is_finite() && default_distance_m > 0.0 {
            self.default_distance_m = default_distance_m;
        }
        self
    }

    pub fn screen_width_px(&self) -> u32 {
        self.screen_width_px
    }

    pub fn screen_height_px(&self) -> u32 {
        self.screen_height_px
    }

    pub fn fov_degrees(&self) -> f64 {
        self.fov_degrees
    }

    pub fn focal_length_px(&self) -> f64 {
        self.focal_length_px
    }

    /// Resize the capture surface. On error the context is left untouched.
    pub fn set_screen_size(&mut self, width_px: u32, height_px: u32) -> Result<()> {
        if height_px == 0 {
            return Err(MeasureError::geometry("screen height must be positive"));
        }
        self.focal_length_px = focal_length_pixels(width_px as f64, self.fov_degrees)?;
        self.screen_width_px = width_px;
        self.screen_height_px = height_px;
        Ok(())
    }

    pub fn set_fov(&mut self, fov_degrees: f64) -> Result<()> {
        self.focal_length_px = focal_length_pixels(self.screen_width_px as f64, fov_degrees)?;
        self.fov_degrees = fov_degrees;
        Ok(())
    }

    /// Record (or clear) the latest AR hit-test distance.
    pub fn set_ar_distance(&mut self, distance_m: Option<f64>) {
        self.ar_distance_m = distance_m.filter(|d| d.is_finite() && *d > 0.0);
    }

    /// Record a tilt sample, converted to a distance for the given device height.
    pub fn set_tilt(&mut self, tilt_angle_degrees: f64, device_height_m: f64) {
        self.tilt_distance_m = Some(estimate_distance_from_tilt(
            tilt_angle_degrees,
            device_height_m,
        ));
    }

    pub fn clear_tilt(&mut self) {
        self.tilt_distance_m = None;
    }

    pub fn has_tilt(&self) -> bool {
        self.tilt_distance_m.is_some()
    }

    pub fn distance_source(&self) -> DistanceSource {
        if self.ar_distance_m.is_some() {
            DistanceSource::ArHitTest
        } else if self.tilt_distance_m.is_some() {
            DistanceSource::SensorTilt
        } else {
            DistanceSource::Default
        }
    }

    /// Best estimate: AR hit-test > sensor tilt > default, clamped to the
    /// plausible hand-held range.
    pub fn distance_to_plane_m(&self) -> f64 {
        self.ar_distance_m
            .or(self.tilt_distance_m)
            .unwrap_or(self.default_distance_m)
            .clamp(MIN_DISTANCE_TO_PLANE_M, MAX_DISTANCE_TO_PLANE_M)
    }

    /// Distance from the tilt sensor alone, if a sample has been recorded.
    pub fn tilt_distance_to_plane_m(&self) -> Option<f64> {
        self.tilt_distance_m
            .map(|d| d.clamp(MIN_DISTANCE_TO_PLANE_M, MAX_DISTANCE_TO_PLANE_M))
    }

    pub fn pixel_distance_to_real_cm(&self, pixel_distance: f64) -> f64 {
        pixel_distance_to_real(pixel_distance, self.focal_length_px, self.distance_to_plane_m())
    }
}
