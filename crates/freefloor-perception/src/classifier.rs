//! Column-occlusion floor classifier.
//!
//! Quantises every ground-frame point of a [`GroundPointCloud`] into a 2-D
//! ground-plane **column** and decides, per pixel, whether the pixel shows
//! traversable floor.
//!
//! # Algorithm
//!
//! A single pass visits the pixels row-major (row outer, column inner):
//!
//! 1. `key = (trunc(x · scale), trunc(y · scale))`.
//! 2. The first point that lands in a column fixes the column's state for the
//!    rest of the pass: *blocked* when its height is inside
//!    `[floor_height, ceiling_height]` or below zero, *clear* otherwise.
//!    Later points in the same column never change it.
//! 3. A pixel is passable iff `0 <= z < floor_height` and its column is
//!    clear.
//!
//! Because the state is first-write-wins, the result depends on the order in
//! which rays reach a column.  A floor-height ray that reaches a column before
//! an obstacle-height ray leaves the column clear.  The traversal order is
//! therefore part of the contract and must not be changed or replaced by a
//! min/max aggregation.
//!
//! Points with a non-finite coordinate are skipped: they neither touch the
//! column state nor get painted.
//!
//! # Example
//!
//! ```rust
//! use freefloor_perception::classifier::{ClassifierParams, ColumnOcclusionClassifier};
//! use freefloor_perception::{GroundPointCloud, Point3};
//! use image::{Rgba, RgbaImage};
//!
//! let cloud = GroundPointCloud::from_points(2, 1, vec![
//!     Point3::new(0.0, 0.0, 0.02), // floor, opens column (0, 0)
//!     Point3::new(1.0, 0.0, 0.5),  // obstacle in column (10, 0)
//! ]).unwrap();
//! let canvas = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 255]));
//!
//! let result = ColumnOcclusionClassifier::new(ClassifierParams::default())
//!     .classify(&cloud, &canvas)
//!     .unwrap();
//! assert!(result.passable.contains(0, 0));
//! assert!(!result.passable.contains(1, 0));
//! ```

use std::collections::HashMap;

use freefloor_types::FloorError;
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::point_cloud::{GroundPointCloud, Point3};

/// Default quantisation factor: 10 columns per metre.
pub const DEFAULT_COLUMN_SCALE: f32 = 10.0;

/// Passable pixels: green at 60 % opacity.
pub const PASSABLE_MARKER: Rgba<u8> = Rgba([0, 255, 0, 153]);

/// Optional marker for pixels in a blocked column.
pub const BLOCKED_MARKER: Rgba<u8> = Rgba([255, 0, 0, 255]);

// ────────────────────────────────────────────────────────────────────────────
// Parameters
// ────────────────────────────────────────────────────────────────────────────

/// Thresholds and options for one classifier instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierParams {
    /// Upper bound (exclusive) of floor height, metres.
    pub floor_height: f32,
    /// Upper bound (inclusive) of the obstacle band, metres.
    pub ceiling_height: f32,
    /// Columns per metre along X and Y.
    pub column_scale: f32,
    /// Paint non-passable pixels of blocked columns with [`BLOCKED_MARKER`].
    pub mark_blocked: bool,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            floor_height: 0.1,
            ceiling_height: 3.0,
            column_scale: DEFAULT_COLUMN_SCALE,
            mark_blocked: false,
        }
    }
}

impl ClassifierParams {
    /// Check `floor_height < ceiling_height` and a positive, finite scale.
    pub fn validate(&self) -> Result<(), FloorError> {
        if !(self.floor_height.is_finite() && self.ceiling_height.is_finite()) {
            return Err(FloorError::InvalidConfig(
                "floor_height and ceiling_height must be finite".to_string(),
            ));
        }
        if self.floor_height >= self.ceiling_height {
            return Err(FloorError::InvalidConfig(format!(
                "floor_height ({}) must be below ceiling_height ({})",
                self.floor_height, self.ceiling_height
            )));
        }
        if !(self.column_scale.is_finite() && self.column_scale > 0.0) {
            return Err(FloorError::InvalidConfig(format!(
                "column_scale must be positive, got {}",
                self.column_scale
            )));
        }
        Ok(())
    }

    /// Height that marks a column blocked when it is the first one observed.
    pub fn is_blocking_height(&self, z: f32) -> bool {
        (z >= self.floor_height && z <= self.ceiling_height) || z < 0.0
    }

    /// Height of a point that may be floor.
    pub fn is_floor_height(&self, z: f32) -> bool {
        z < self.floor_height && z >= 0.0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ColumnKey / ColumnState
// ────────────────────────────────────────────────────────────────────────────

/// A quantised ground-plane bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnKey {
    pub x: i32,
    pub y: i32,
}

impl ColumnKey {
    /// Scale the point's ground-plane coordinates and truncate toward zero.
    pub fn from_point(p: Point3, scale: f32) -> Self {
        Self {
            x: (p.x * scale) as i32,
            y: (p.y * scale) as i32,
        }
    }
}

/// Per-pass blocked/clear state of every observed column.
#[derive(Debug, Clone, Default)]
pub struct ColumnState {
    columns: HashMap<ColumnKey, bool>,
}

impl ColumnState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `blocked` for `key` unless the column was already observed, and
    /// return the column's (possibly pre-existing) state.
    pub fn insert_if_absent(&mut self, key: ColumnKey, blocked: bool) -> bool {
        *self.columns.entry(key).or_insert(blocked)
    }

    /// `Some(true)` for blocked, `Some(false)` for clear, `None` when the
    /// column has not been observed in this pass.
    pub fn is_blocked(&self, key: ColumnKey) -> Option<bool> {
        self.columns.get(&key).copied()
    }

    /// Number of observed columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn blocked_count(&self) -> usize {
        self.columns.values().filter(|b| **b).count()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PassablePixelSet
// ────────────────────────────────────────────────────────────────────────────

/// Ordered list of passable `(column, row)` pixels with O(1) membership.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassablePixelSet {
    width: u32,
    height: u32,
    pixels: Vec<(u32, u32)>,
    membership: Vec<bool>,
}

impl PassablePixelSet {
    /// An empty set for a `width × height` image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: Vec::new(),
            membership: vec![false; width as usize * height as usize],
        }
    }

    /// Append `(c, r)`. Pixels outside the image are ignored.
    pub fn push(&mut self, c: u32, r: u32) {
        if let Some(i) = self.index(c, r) {
            self.membership[i] = true;
            self.pixels.push((c, r));
        }
    }

    pub fn contains(&self, c: u32, r: u32) -> bool {
        self.index(c, r).is_some_and(|i| self.membership[i])
    }

    /// Pixels in the order they were classified.
    pub fn pixels(&self) -> &[(u32, u32)] {
        &self.pixels
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, c: u32, r: u32) -> Option<usize> {
        (c < self.width && r < self.height)
            .then(|| r as usize * self.width as usize + c as usize)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Classifier
// ────────────────────────────────────────────────────────────────────────────

/// Output of one classification pass.
#[derive(Debug, Clone)]
pub struct Classification {
    /// Canvas copy with passable (and optionally blocked) pixels painted.
    pub mask: RgbaImage,
    pub passable: PassablePixelSet,
    pub columns: ColumnState,
}

/// Single-pass, order-dependent floor classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnOcclusionClassifier {
    params: ClassifierParams,
}

impl ColumnOcclusionClassifier {
    pub fn new(params: ClassifierParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    /// Classify every pixel of a ground-frame `cloud`.
    ///
    /// Every call starts from an empty [`ColumnState`]; nothing is retained
    /// across passes.
    ///
    /// # Errors
    ///
    /// Returns [`FloorError::FrameSizeMismatch`] when `canvas` does not have
    /// the cloud's dimensions.
    pub fn classify(
        &self,
        cloud: &GroundPointCloud,
        canvas: &RgbaImage,
    ) -> Result<Classification, FloorError> {
        let (width, height) = (cloud.width(), cloud.height());
        if canvas.dimensions() != (width, height) {
            return Err(FloorError::FrameSizeMismatch {
                expected_width: width,
                expected_height: height,
                actual_width: canvas.width(),
                actual_height: canvas.height(),
            });
        }

        let mut mask = canvas.clone();
        let mut passable = PassablePixelSet::new(width, height);
        let mut columns = ColumnState::new();
        let points = cloud.points();

        for r in 0..height {
            for c in 0..width {
                let p = points[r as usize * width as usize + c as usize];
                if !p.is_finite() {
                    continue;
                }
                let key = ColumnKey::from_point(p, self.params.column_scale);
                let blocked =
                    columns.insert_if_absent(key, self.params.is_blocking_height(p.z));

                if self.params.is_floor_height(p.z) && !blocked {
                    passable.push(c, r);
                    mask.put_pixel(c, r, PASSABLE_MARKER);
                } else if blocked && self.params.mark_blocked {
                    mask.put_pixel(c, r, BLOCKED_MARKER);
                }
            }
        }

        trace!(
            passable = passable.len(),
            columns = columns.len(),
            blocked_columns = columns.blocked_count(),
            "classification pass complete"
        );

        Ok(Classification {
            mask,
            passable,
            columns,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
