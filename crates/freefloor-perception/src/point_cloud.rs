//! Organised point cloud.
//!
//! A [`GroundPointCloud`] keeps one [`Point3`] per depth pixel, stored
//! row-major, so that index `(c, r)` in the cloud always corresponds to pixel
//! `(c, r)` in the frame it was built from.  Points start out in the camera
//! frame and are overwritten in place when projected into the ground frame.

// ────────────────────────────────────────────────────────────────────────────
// Point3
// ────────────────────────────────────────────────────────────────────────────

/// A point in 3-D space (metres).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    /// Create a new point.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// A point with all coordinates set to NaN, used for pixels without a
    /// depth sample.
    pub fn invalid() -> Self {
        Self::new(f32::NAN, f32::NAN, f32::NAN)
    }

    /// True when every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GroundPointCloud
// ────────────────────────────────────────────────────────────────────────────

/// A W×H grid of 3-D points, one per depth pixel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroundPointCloud {
    width: u32,
    height: u32,
    points: Vec<Point3>,
}

impl GroundPointCloud {
    /// Create a cloud of `width * height` zero points.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            points: vec![Point3::default(); width as usize * height as usize],
        }
    }

    /// Build a cloud from row-major points.
    ///
    /// Returns `None` when `points.len() != width * height`.
    pub fn from_points(width: u32, height: u32, points: Vec<Point3>) -> Option<Self> {
        if points.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            points,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total number of points (`width * height`).
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The point at pixel `(c, r)`, or `None` outside the grid.
    pub fn get(&self, c: u32, r: u32) -> Option<Point3> {
        self.index(c, r).map(|i| self.points[i])
    }

    /// Row-major view of all points.
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut [Point3] {
        &mut self.points
    }

    fn index(&self, c: u32, r: u32) -> Option<usize> {
        (c < self.width && r < self.height)
            .then(|| r as usize * self.width as usize + c as usize)
    }
}
