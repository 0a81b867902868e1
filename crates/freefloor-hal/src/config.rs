//! Device configuration sections.
//!
//! These map one-to-one onto the `[RGBD_SENSOR_CLIENT]` and
//! `[TRANSFORM_CLIENT]` tables of the `freefloor` TOML file.

use std::path::PathBuf;

use freefloor_perception::PinholeIntrinsics;
use serde::{Deserialize, Serialize};

/// `[RGBD_SENSOR_CLIENT]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorClientConfig {
    /// Driver name resolved by the
    /// [`DeviceRegistry`][crate::registry::DeviceRegistry].
    pub device: String,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Explicit depth intrinsics. Takes precedence over `hfov_deg`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intrinsics: Option<PinholeIntrinsics>,

    /// Horizontal field of view used to derive intrinsics when none are given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hfov_deg: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sim: Option<SimSceneConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay: Option<ReplayConfig>,
}

fn default_width() -> u32 {
    64
}
fn default_height() -> u32 {
    48
}

impl SensorClientConfig {
    /// Resolve the depth intrinsics, or `None` when neither explicit values
    /// nor a field of view are configured.
    pub fn resolve_intrinsics(&self) -> Option<PinholeIntrinsics> {
        self.intrinsics.or_else(|| {
            self.hfov_deg
                .map(|fov| PinholeIntrinsics::from_fov(self.width, self.height, fov.to_radians()))
        })
    }
}

/// Scene rendered by the synthetic sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSceneConfig {
    /// Camera position in the ground frame (metres).
    #[serde(default = "default_camera_translation")]
    pub camera_translation: [f64; 3],
    /// Optical-frame orientation as roll/pitch/yaw (radians).
    #[serde(default = "default_camera_rpy")]
    pub camera_rpy: [f64; 3],
    /// Rays longer than this report no return.
    #[serde(default = "default_max_range")]
    pub max_range: f32,
    /// Height of the rendered floor plane.
    #[serde(default)]
    pub floor_z: f32,
    #[serde(default)]
    pub obstacles: Vec<BoxObstacle>,
}

/// 1.0 m above the ground origin.
fn default_camera_translation() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}
/// Optical axis along ground +X, tilted 0.5 rad toward the floor.
fn default_camera_rpy() -> [f64; 3] {
    [-(std::f64::consts::FRAC_PI_2 + 0.5), 0.0, -std::f64::consts::FRAC_PI_2]
}
fn default_max_range() -> f32 {
    10.0
}

impl Default for SimSceneConfig {
    fn default() -> Self {
        Self {
            camera_translation: default_camera_translation(),
            camera_rpy: default_camera_rpy(),
            max_range: default_max_range(),
            floor_z: 0.0,
            obstacles: Vec::new(),
        }
    }
}

/// Axis-aligned box in the ground frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxObstacle {
    pub min: [f32; 3],
    pub max: [f32; 3],
    #[serde(default = "default_obstacle_color")]
    pub color: [u8; 3],
}

fn default_obstacle_color() -> [u8; 3] {
    [200, 120, 40]
}

/// Recorded frames for the replay sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Directory holding `depth_NNNN.png` (16-bit millimetres) and
    /// `color_NNNN.png` pairs.
    pub dir: PathBuf,
    /// Start over after the last recorded frame.
    #[serde(default = "default_true")]
    pub loop_frames: bool,
}

fn default_true() -> bool {
    true
}

/// `[TRANSFORM_CLIENT]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformClientConfig {
    pub device: String,
    #[serde(default)]
    pub transforms: Vec<FrameEdge>,
}

/// Pose of `child` expressed in `parent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameEdge {
    pub parent: String,
    pub child: String,
    #[serde(default)]
    pub translation: [f64; 3],
    #[serde(default)]
    pub rpy: [f64; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_section_defaults() {
        let cfg: SensorClientConfig = toml::from_str(r#"device = "sim""#).unwrap();
        assert_eq!(cfg.width, 64);
        assert_eq!(cfg.height, 48);
        assert!(cfg.resolve_intrinsics().is_none());
        assert!(cfg.sim.is_none());
    }

    #[test]
    fn explicit_intrinsics_win_over_fov() {
        let cfg: SensorClientConfig = toml::from_str(
            r#"
            device = "sim"
            hfov_deg = 90.0
            [intrinsics]
            fx = 10.0
            fy = 11.0
            cx = 5.0
            cy = 4.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.resolve_intrinsics().unwrap().fy, 11.0);
    }

    #[test]
    fn fov_derives_intrinsics() {
        let cfg: SensorClientConfig =
            toml::from_str("device = \"sim\"\nwidth = 100\nheight = 50\nhfov_deg = 90.0").unwrap();
        let k = cfg.resolve_intrinsics().unwrap();
        assert!((k.fx - 50.0).abs() < 1e-3);
        assert!((k.cx - 49.5).abs() < 1e-6);
    }

    #[test]
    fn transform_section_parses_edges() {
        let cfg: TransformClientConfig = toml::from_str(
            r#"
            device = "static"
            [[transforms]]
            parent = "/ground_frame"
            child = "/depth_camera_frame"
            translation = [0.0, 0.0, 1.2]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.transforms.len(), 1);
        assert_eq!(cfg.transforms[0].rpy, [0.0, 0.0, 0.0]);
        assert_eq!(cfg.transforms[0].translation[2], 1.2);
    }
}
