//! `freefloor-perception` – geometry and classification core.
//!
//! Turns a depth frame and a camera→ground transform into a per-pixel
//! "traversable floor" classification.
//!
//! # Modules
//!
//! - [`point_cloud`] – [`GroundPointCloud`][point_cloud::GroundPointCloud]:
//!   a W×H grid of 3-D points indexed exactly like the source depth frame.
//! - [`projection`] – [`PinholeIntrinsics`][projection::PinholeIntrinsics]
//!   back-projection of depth pixels and the
//!   [`PointProjector`][projection::PointProjector] that moves a cloud into
//!   the ground frame.
//! - [`transform`] – [`RigidTransform`][transform::RigidTransform] (4×4
//!   homogeneous matrix) and [`TfEngine`][transform::TfEngine], a graph of
//!   named reference frames.
//! - [`classifier`] –
//!   [`ColumnOcclusionClassifier`][classifier::ColumnOcclusionClassifier]:
//!   quantises ground-frame points into columns and marks floor pixels whose
//!   column holds no obstacle.

pub mod classifier;
pub mod point_cloud;
pub mod projection;
pub mod transform;

pub use classifier::{
    Classification, ClassifierParams, ColumnKey, ColumnOcclusionClassifier, ColumnState,
    PassablePixelSet,
};
pub use point_cloud::{GroundPointCloud, Point3};
pub use projection::{PinholeIntrinsics, PointProjector};
pub use transform::{RigidTransform, TfEngine};
