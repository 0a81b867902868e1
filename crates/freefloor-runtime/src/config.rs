//! [`FloorConfig`] – the configuration model for one detection pipeline.
//!
//! Top-level keys configure the loop and its ports.  Named sections hold the
//! clipping thresholds and the two device clients:
//!
//! | Section | Required | Contents |
//! |---|---|---|
//! | `[Z_CLIPPING_PLANES]` | no | heights, frame ids, column scale |
//! | `[RGBD_SENSOR_CLIENT]` | yes | [`SensorClientConfig`] |
//! | `[TRANSFORM_CLIENT]` | yes | [`TransformClientConfig`] |

use std::path::{Path, PathBuf};
use std::time::Duration;

use freefloor_hal::config::{
    BoxObstacle, FrameEdge, SensorClientConfig, SimSceneConfig, TransformClientConfig,
};
use freefloor_perception::ClassifierParams;
use freefloor_perception::classifier::DEFAULT_COLUMN_SCALE;
use freefloor_types::FloorError;
use serde::{Deserialize, Serialize};

pub const SENSOR_SECTION: &str = "RGBD_SENSOR_CLIENT";
pub const TRANSFORM_SECTION: &str = "TRANSFORM_CLIENT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorConfig {
    /// Seconds between the start of two detection cycles.
    #[serde(default = "default_period_s")]
    pub period_s: f64,

    /// Output port for ground-frame `(x, y)` answers.
    #[serde(default = "default_target_pos_port")]
    pub target_pos_port: String,

    /// Output port for the visualization mask.
    #[serde(default = "default_img_out_port")]
    pub img_out_port: String,

    /// Input port for pixel clicks.
    #[serde(default = "default_clicked_pos_port")]
    pub clicked_pos_port: String,

    /// Directory for mask snapshots written by the CLI.  Disabled when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<PathBuf>,

    /// Write every Nth mask to `snapshot_dir`.
    #[serde(default = "default_snapshot_every")]
    pub snapshot_every: u64,

    /// Paint pixels of blocked columns red.
    #[serde(default)]
    pub mark_blocked: bool,

    #[serde(rename = "Z_CLIPPING_PLANES", default)]
    pub clipping: ClippingPlanes,

    #[serde(rename = "RGBD_SENSOR_CLIENT", default, skip_serializing_if = "Option::is_none")]
    pub sensor: Option<SensorClientConfig>,

    #[serde(rename = "TRANSFORM_CLIENT", default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformClientConfig>,
}

/// `[Z_CLIPPING_PLANES]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClippingPlanes {
    #[serde(default = "default_floor_height")]
    pub floor_height: f32,
    #[serde(default = "default_ceiling_height")]
    pub ceiling_height: f32,
    #[serde(default = "default_ground_frame_id")]
    pub ground_frame_id: String,
    #[serde(default = "default_camera_frame_id")]
    pub camera_frame_id: String,
    #[serde(default = "default_column_scale")]
    pub column_scale: f32,
}

fn default_period_s() -> f64 {
    0.1
}
fn default_target_pos_port() -> String {
    "/free_floor_viewer/target:o".to_string()
}
fn default_img_out_port() -> String {
    "/freeFloorViewer/floorEnhanced:o".to_string()
}
fn default_clicked_pos_port() -> String {
    "/freeFloorViewer/clicked_pos:i".to_string()
}
fn default_snapshot_every() -> u64 {
    10
}
fn default_floor_height() -> f32 {
    0.1
}
fn default_ceiling_height() -> f32 {
    3.0
}
fn default_ground_frame_id() -> String {
    "/ground_frame".to_string()
}
fn default_camera_frame_id() -> String {
    "/depth_camera_frame".to_string()
}
fn default_column_scale() -> f32 {
    DEFAULT_COLUMN_SCALE
}

impl Default for ClippingPlanes {
    fn default() -> Self {
        Self {
            floor_height: default_floor_height(),
            ceiling_height: default_ceiling_height(),
            ground_frame_id: default_ground_frame_id(),
            camera_frame_id: default_camera_frame_id(),
            column_scale: default_column_scale(),
        }
    }
}

impl Default for FloorConfig {
    /// A runnable configuration: the synthetic sensor looking at a floor with
    /// one box, and a static transform matching the simulated camera pose.
    fn default() -> Self {
        let clipping = ClippingPlanes::default();
        // Floor rendered 2 cm up so float noise never pushes it below z = 0.
        let scene = SimSceneConfig {
            floor_z: 0.02,
            obstacles: vec![BoxObstacle {
                min: [2.0, -0.3, 0.02],
                max: [2.4, 0.3, 0.8],
                color: [200, 120, 40],
            }],
            ..SimSceneConfig::default()
        };
        let transform = TransformClientConfig {
            device: "static".to_string(),
            transforms: vec![FrameEdge {
                parent: clipping.ground_frame_id.clone(),
                child: clipping.camera_frame_id.clone(),
                translation: scene.camera_translation,
                rpy: scene.camera_rpy,
            }],
        };
        let sensor = SensorClientConfig {
            device: "sim".to_string(),
            width: 64,
            height: 48,
            intrinsics: None,
            hfov_deg: Some(60.0),
            sim: Some(scene),
            replay: None,
        };
        Self {
            period_s: default_period_s(),
            target_pos_port: default_target_pos_port(),
            img_out_port: default_img_out_port(),
            clicked_pos_port: default_clicked_pos_port(),
            snapshot_dir: None,
            snapshot_every: default_snapshot_every(),
            mark_blocked: false,
            clipping,
            sensor: Some(sensor),
            transform: Some(transform),
        }
    }
}

impl FloorConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// [`FloorError::InvalidConfig`] on a syntax or type error.  Missing
    /// sections are only reported by [`FloorConfig::validate`].
    pub fn from_toml_str(text: &str) -> Result<Self, FloorError> {
        toml::from_str(text).map_err(|e| FloorError::InvalidConfig(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, FloorError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FloorError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, FloorError> {
        toml::to_string_pretty(self).map_err(|e| FloorError::InvalidConfig(e.to_string()))
    }

    /// The `[RGBD_SENSOR_CLIENT]` section.
    pub fn sensor_section(&self) -> Result<&SensorClientConfig, FloorError> {
        self.sensor
            .as_ref()
            .ok_or_else(|| FloorError::MissingConfigSection(SENSOR_SECTION.to_string()))
    }

    /// The `[TRANSFORM_CLIENT]` section.
    pub fn transform_section(&self) -> Result<&TransformClientConfig, FloorError> {
        self.transform
            .as_ref()
            .ok_or_else(|| FloorError::MissingConfigSection(TRANSFORM_SECTION.to_string()))
    }

    pub fn classifier_params(&self) -> ClassifierParams {
        ClassifierParams {
            floor_height: self.clipping.floor_height,
            ceiling_height: self.clipping.ceiling_height,
            column_scale: self.clipping.column_scale,
            mark_blocked: self.mark_blocked,
        }
    }

    /// Loop period.  Only meaningful after [`FloorConfig::validate`].
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(self.period_s)
    }

    /// Everything initialisation needs before a device is opened.
    pub fn validate(&self) -> Result<(), FloorError> {
        self.sensor_section()?;
        self.transform_section()?;
        if !(self.period_s.is_finite() && self.period_s > 0.0) {
            return Err(FloorError::InvalidConfig(format!(
                "period_s must be positive, got {}",
                self.period_s
            )));
        }
        if self.snapshot_every == 0 {
            return Err(FloorError::InvalidConfig(
                "snapshot_every must be at least 1".to_string(),
            ));
        }
        self.classifier_params().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [RGBD_SENSOR_CLIENT]
        device = "sim"

        [TRANSFORM_CLIENT]
        device = "static"
    "#;

    #[test]
    fn minimal_document_uses_defaults() {
        let cfg = FloorConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(cfg.period_s, 0.1);
        assert_eq!(cfg.target_pos_port, "/free_floor_viewer/target:o");
        assert_eq!(cfg.img_out_port, "/freeFloorViewer/floorEnhanced:o");
        assert_eq!(cfg.clipping, ClippingPlanes::default());
        assert_eq!(cfg.clipping.ground_frame_id, "/ground_frame");
        assert_eq!(cfg.clipping.camera_frame_id, "/depth_camera_frame");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn missing_sensor_section_is_fatal() {
        let cfg = FloorConfig::from_toml_str("[TRANSFORM_CLIENT]\ndevice = \"static\"").unwrap();
        let err = cfg.validate().unwrap_err();
        assert_eq!(err, FloorError::MissingConfigSection(SENSOR_SECTION.to_string()));
        assert!(err.is_fatal());
    }

    #[test]
    fn missing_transform_section_is_fatal() {
        let cfg = FloorConfig::from_toml_str("[RGBD_SENSOR_CLIENT]\ndevice = \"sim\"").unwrap();
        assert_eq!(
            cfg.validate().unwrap_err(),
            FloorError::MissingConfigSection(TRANSFORM_SECTION.to_string())
        );
    }

    #[test]
    fn inverted_clipping_planes_are_rejected() {
        let text = format!("{MINIMAL}\n[Z_CLIPPING_PLANES]\nfloor_height = 2.0\nceiling_height = 1.0\n");
        let cfg = FloorConfig::from_toml_str(&text).unwrap();
        assert!(matches!(cfg.validate(), Err(FloorError::InvalidConfig(_))));
    }

    #[test]
    fn non_positive_period_is_rejected() {
        let text = format!("period_s = 0.0\n{MINIMAL}");
        let cfg = FloorConfig::from_toml_str(&text).unwrap();
        assert!(matches!(cfg.validate(), Err(FloorError::InvalidConfig(_))));
    }

    #[test]
    fn syntax_error_is_invalid_config() {
        assert!(matches!(
            FloorConfig::from_toml_str("period_s = ["),
            Err(FloorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn default_round_trips_through_toml() {
        let cfg = FloorConfig::default();
        let text = cfg.to_toml_string().unwrap();
        assert!(text.contains("[RGBD_SENSOR_CLIENT]"));
        assert!(text.contains("[Z_CLIPPING_PLANES]"));
        assert_eq!(FloorConfig::from_toml_str(&text).unwrap(), cfg);
    }

    #[test]
    fn default_transform_matches_sim_camera() {
        let cfg = FloorConfig::default();
        let sim = cfg.sensor.as_ref().and_then(|s| s.sim.clone()).unwrap();
        let edge = &cfg.transform.as_ref().unwrap().transforms[0];
        assert_eq!(edge.translation, sim.camera_translation);
        assert_eq!(edge.rpy, sim.camera_rpy);
        assert_eq!(edge.child, cfg.clipping.camera_frame_id);
    }

    #[test]
    fn classifier_params_follow_config() {
        let mut cfg = FloorConfig::default();
        cfg.mark_blocked = true;
        cfg.clipping.column_scale = 20.0;
        let p = cfg.classifier_params();
        assert!(p.mark_blocked);
        assert_eq!(p.column_scale, 20.0);
    }
}
