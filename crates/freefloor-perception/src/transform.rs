//! Rigid transforms and the frame graph.
//!
//! [`RigidTransform`] is a 4×4 homogeneous matrix that maps points expressed
//! in one reference frame into another.  [`TfEngine`] keeps a graph of named
//! frames and composes a chain of edges via BFS so that any two connected
//! frames can be related.
//!
//! # Example
//!
//! ```rust
//! use freefloor_perception::transform::{RigidTransform, TfEngine};
//! use freefloor_perception::Point3;
//!
//! let mut tf = TfEngine::new();
//!
//! // The base sits 1 m forward of the ground origin.
//! tf.set_transform("/ground_frame", "/base",
//!     RigidTransform::from_translation_rpy([1.0, 0.0, 0.0], [0.0, 0.0, 0.0]));
//! // The camera is mounted 0.5 m above the base.
//! tf.set_transform("/base", "/depth_camera_frame",
//!     RigidTransform::from_translation_rpy([0.0, 0.0, 0.5], [0.0, 0.0, 0.0]));
//!
//! let m = tf.lookup("/depth_camera_frame", "/ground_frame").unwrap();
//! let p = m.apply(Point3::new(0.0, 0.0, 0.0));
//! assert!((p.x - 1.0).abs() < 1e-6);
//! assert!((p.z - 0.5).abs() < 1e-6);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};

use nalgebra::{Isometry3, Matrix3, Matrix4, Translation3, UnitQuaternion, Vector3, Vector4};

use crate::point_cloud::Point3;

// ────────────────────────────────────────────────────────────────────────────
// RigidTransform
// ────────────────────────────────────────────────────────────────────────────

/// A 4×4 homogeneous transform.
///
/// Applied to a point `p` as `M · [p, 1]ᵀ`; the fourth row is not used to
/// re-normalise the result.  Well-formedness (orthonormal rotation block,
/// `[0 0 0 1]` last row) is the caller's responsibility.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    matrix: Matrix4<f64>,
}

impl RigidTransform {
    /// Wrap an arbitrary 4×4 matrix.
    pub fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    /// Build from a row-major array of 16 values.
    pub fn from_row_slice(values: &[f64; 16]) -> Self {
        Self::from_matrix(Matrix4::from_row_slice(values))
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self::from_matrix(Matrix4::identity())
    }

    /// Rotation from roll/pitch/yaw (radians, applied as
    /// `yaw · pitch · roll`) followed by a translation.
    pub fn from_translation_rpy(translation: [f64; 3], rpy: [f64; 3]) -> Self {
        let iso = Isometry3::from_parts(
            Translation3::new(translation[0], translation[1], translation[2]),
            UnitQuaternion::from_euler_angles(rpy[0], rpy[1], rpy[2]),
        );
        Self::from_matrix(iso.to_homogeneous())
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// `self` applied after `first`: the result maps a point through `first`
    /// and then through `self`.
    pub fn after(&self, first: &RigidTransform) -> RigidTransform {
        Self::from_matrix(self.matrix * first.matrix)
    }

    /// Inverse assuming the upper-left 3×3 block is a rotation.
    pub fn inverse_rigid(&self) -> RigidTransform {
        let rotation: Matrix3<f64> = self.matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let translation: Vector3<f64> = self.matrix.fixed_view::<3, 1>(0, 3).into_owned();
        let rt = rotation.transpose();
        let mut inv = Matrix4::identity();
        inv.fixed_view_mut::<3, 3>(0, 0).copy_from(&rt);
        inv.fixed_view_mut::<3, 1>(0, 3).copy_from(&(-rt * translation));
        Self::from_matrix(inv)
    }

    /// Apply the transform to the homogeneous coordinate of `p`.
    pub fn apply(&self, p: Point3) -> Point3 {
        let v = self.matrix * Vector4::new(f64::from(p.x), f64::from(p.y), f64::from(p.z), 1.0);
        Point3::new(v[0] as f32, v[1] as f32, v[2] as f32)
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TfEngine
// ────────────────────────────────────────────────────────────────────────────

/// A graph of named reference frames and the [`RigidTransform`]s relating
/// them.
///
/// Every call to [`set_transform`][Self::set_transform] registers the edge in
/// both directions, so a chain can be walked up or down the tree.
#[derive(Debug, Default, Clone)]
pub struct TfEngine {
    /// `edges[from][to]` maps points expressed in `from` into `to`.
    edges: HashMap<String, HashMap<String, RigidTransform>>,
}

impl TfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update the pose of `child_frame` expressed in
    /// `parent_frame`, i.e. the transform that maps child coordinates to
    /// parent coordinates.
    pub fn set_transform(&mut self, parent_frame: &str, child_frame: &str, pose: RigidTransform) {
        self.edges
            .entry(child_frame.to_string())
            .or_default()
            .insert(parent_frame.to_string(), pose);
        self.edges
            .entry(parent_frame.to_string())
            .or_default()
            .insert(child_frame.to_string(), pose.inverse_rigid());
    }

    /// The transform that maps points expressed in `from_frame` into
    /// `to_frame`, or `None` if the frames are not connected.
    pub fn lookup(&self, from_frame: &str, to_frame: &str) -> Option<RigidTransform> {
        if from_frame == to_frame {
            return Some(RigidTransform::identity());
        }

        let mut queue: VecDeque<(&str, RigidTransform)> = VecDeque::new();
        let mut visited: HashSet<&str> = HashSet::new();

        queue.push_back((from_frame, RigidTransform::identity()));
        visited.insert(from_frame);

        while let Some((current, accumulated)) = queue.pop_front() {
            let Some(neighbours) = self.edges.get(current) else {
                continue;
            };
            for (next, edge) in neighbours {
                if !visited.insert(next.as_str()) {
                    continue;
                }
                let composed = edge.after(&accumulated);
                if next == to_frame {
                    return Some(composed);
                }
                queue.push_back((next.as_str(), composed));
            }
        }

        None
    }
}
