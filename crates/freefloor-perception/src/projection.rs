//! Depth back-projection and ground-frame projection.
//!
//! [`PinholeIntrinsics::back_project`] turns a row-major depth image (metres)
//! into a camera-frame [`GroundPointCloud`]; [`PointProjector`] then rewrites
//! every point in place with a [`RigidTransform`].

use serde::{Deserialize, Serialize};

use crate::point_cloud::{GroundPointCloud, Point3};
use crate::transform::RigidTransform;

/// Pinhole camera intrinsics for the depth stream (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PinholeIntrinsics {
    /// Focal length along X.
    pub fx: f32,
    /// Focal length along Y.
    pub fy: f32,
    /// Principal point X.
    pub cx: f32,
    /// Principal point Y.
    pub cy: f32,
}

impl PinholeIntrinsics {
    /// Centred principal point and a square focal length derived from the
    /// horizontal field of view.
    pub fn from_fov(width: u32, height: u32, hfov_rad: f32) -> Self {
        let f = width as f32 / (2.0 * (hfov_rad / 2.0).tan());
        Self {
            fx: f,
            fy: f,
            cx: (width as f32 - 1.0) / 2.0,
            cy: (height as f32 - 1.0) / 2.0,
        }
    }

    /// True when both focal lengths are finite and non-zero.
    pub fn is_valid(&self) -> bool {
        self.fx.is_finite()
            && self.fy.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.fx != 0.0
            && self.fy != 0.0
    }

    /// Camera-frame point seen at pixel `(u, v)` with depth `z`.
    pub fn unproject(&self, u: u32, v: u32, z: f32) -> Point3 {
        Point3::new(
            (u as f32 - self.cx) * z / self.fx,
            (v as f32 - self.cy) * z / self.fy,
            z,
        )
    }

    /// Back-project a row-major depth image into a camera-frame cloud.
    ///
    /// Pixels missing from a short `depth` slice become
    /// [`Point3::invalid`] so the cloud always has `width * height` entries.
    pub fn back_project(&self, depth: &[f32], width: u32, height: u32) -> GroundPointCloud {
        let mut cloud = GroundPointCloud::new(width, height);
        for (idx, point) in cloud.points_mut().iter_mut().enumerate() {
            let u = (idx % width as usize) as u32;
            let v = (idx / width as usize) as u32;
            *point = match depth.get(idx) {
                Some(&z) => self.unproject(u, v, z),
                None => Point3::invalid(),
            };
        }
        cloud
    }
}

/// Moves a camera-frame cloud into the ground frame.
///
/// Pure per-point operation: every point is replaced by `M · [p, 1]ᵀ`.  The
/// transform is not validated.
#[derive(Debug, Clone, Copy)]
pub struct PointProjector {
    transform: RigidTransform,
}

impl PointProjector {
    pub fn new(transform: RigidTransform) -> Self {
        Self { transform }
    }

    /// Overwrite every point of `cloud` with its transformed coordinates.
    pub fn project_in_place(&self, cloud: &mut GroundPointCloud) {
        for p in cloud.points_mut() {
            *p = self.transform.apply(*p);
        }
    }
}
