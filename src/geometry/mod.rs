//! Unit conversion between pixels, tilt angles and metric distances.
//!
//! Everything here is pure: no state beyond `CameraFrameContext`, which the
//! caller owns.

pub mod camera;
pub mod intrinsics;
pub mod points;

pub use camera::{
    estimate_distance_from_tilt, focal_length_pixels, pixel_distance_to_real, CameraFrameContext,
    DistanceSource,
};
pub use intrinsics::{ArHit, CameraIntrinsics};
pub use points::{screen_pixel_distance, world_point_distance_cm, ScreenPoint, WorldPoint};
