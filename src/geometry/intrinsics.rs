//! Pinhole intrinsics for sizing detections and the AR hit-test adapter.

use serde::{Deserialize, Serialize};

use super::camera::{focal_length_pixels, CameraFrameContext};
use super::points::WorldPoint;
use crate::detection::NormalizedBox;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub image_width: f64,
    pub image_height: f64,
}

impl CameraIntrinsics {
    /// Square-pixel intrinsics with the principal point at the image centre.
    pub fn from_fov(image_width: u32, image_height: u32, fov_degrees: f64) -> Result<Self> {
        let f = focal_length_pixels(image_width as f64, fov_degrees)?;
        Ok(Self {
            fx: f,
            fy: f,
            cx: image_width as f64 / 2.0,
            cy: image_height as f64 / 2.0,
            image_width: image_width as f64,
            image_height: image_height as f64,
        })
    }

    pub fn from_context(ctx: &CameraFrameContext) -> Self {
        let f = ctx.focal_length_px();
        let w = ctx.screen_width_px() as f64;
        let h = ctx.screen_height_px() as f64;
        Self {
            fx: f,
            fy: f,
            cx: w / 2.0,
            cy: h / 2.0,
            image_width: w,
            image_height: h,
        }
    }

    /// Width and height in centimeters of a normalized box seen at `distance_m`.
    pub fn real_world_size_cm(&self, bbox: &NormalizedBox, distance_m: f64) -> (f64, f64) {
        let pixel_width = bbox.w * self.image_width;
        let pixel_height = bbox.h * self.image_height;
        let width_m = pixel_width * distance_m / self.fx;
        let height_m = pixel_height * distance_m / self.fy;
        (width_m * 100.0, height_m * 100.0)
    }

    /// Unit direction of the camera ray through a pixel.
    pub fn pixel_to_ray(&self, pixel_x: f64, pixel_y: f64) -> WorldPoint {
        let x = (pixel_x - self.cx) / self.fx;
        let y = (pixel_y - self.cy) / self.fy;
        let ray = WorldPoint::new(x, y, 1.0);
        let len = ray.norm();
        WorldPoint::new(ray.x / len, ray.y / len, ray.z / len)
    }
}

/// What an AR plane tracker reports for a tap. Trackers differ in which of
/// these they fill in.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArHit {
    pub distance: Option<f64>,
    pub point: Option<WorldPoint>,
    pub pose_translation: Option<[f64; 3]>,
}

impl ArHit {
    /// Camera-to-plane distance: explicit distance, then |z| of the hit
    /// point, then the norm of the pose translation.
    pub fn distance_m(&self) -> Option<f64> {
        if let Some(d) = self.distance {
            return Some(d.abs());
        }
        if let Some(p) = self.point {
            return Some(p.z.abs());
        }
        self.pose_translation
            .map(|[x, y, z]| WorldPoint::new(x, y, z).norm())
    }
}
