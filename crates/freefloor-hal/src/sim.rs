//! Synthetic RGB-D sensor for headless runs and tests.
//!
//! [`SimRgbdSensor`] ray-casts a flat floor at `z = floor_z` plus a list of
//! axis-aligned boxes from a camera posed in the ground frame.  The scene is
//! static, so both images are rendered once at open time and every fetch
//! returns a copy.
//!
//! # Example
//!
//! ```rust
//! use freefloor_hal::camera::DepthSource;
//! use freefloor_hal::config::SimSceneConfig;
//! use freefloor_hal::sim::SimRgbdSensor;
//!
//! let mut sensor = SimRgbdSensor::new("sim", 32, 24, None, SimSceneConfig::default());
//! let frame = sensor.depth_frame().unwrap();
//! assert_eq!(frame.data.len(), 32 * 24);
//! ```

use freefloor_perception::{PinholeIntrinsics, Point3, RigidTransform};
use freefloor_types::FloorError;
use tracing::debug;

use crate::camera::{ColorFrame, DepthFrame, DepthSource};
use crate::config::{BoxObstacle, SensorClientConfig, SimSceneConfig};

/// Field of view used when the sensor section configures no intrinsics.
pub const DEFAULT_SIM_HFOV_DEG: f32 = 60.0;

const FLOOR_LIGHT: [u8; 3] = [180, 180, 180];
const FLOOR_DARK: [u8; 3] = [90, 90, 90];
const NO_RETURN: [u8; 3] = [0, 0, 0];

pub struct SimRgbdSensor {
    id: String,
    intrinsics: PinholeIntrinsics,
    depth: DepthFrame,
    color: ColorFrame,
    frames_served: u64,
    open: bool,
}

impl SimRgbdSensor {
    pub fn new(
        id: impl Into<String>,
        width: u32,
        height: u32,
        intrinsics: Option<PinholeIntrinsics>,
        scene: SimSceneConfig,
    ) -> Self {
        let intrinsics = intrinsics.unwrap_or_else(|| {
            PinholeIntrinsics::from_fov(width, height, DEFAULT_SIM_HFOV_DEG.to_radians())
        });
        let (depth, color) = render(width, height, &intrinsics, &scene);
        Self {
            id: id.into(),
            intrinsics,
            depth,
            color,
            frames_served: 0,
            open: true,
        }
    }

    /// Open from an `[RGBD_SENSOR_CLIENT]` section; a missing `sim` table
    /// uses the default scene.
    pub fn from_config(config: &SensorClientConfig) -> Self {
        Self::new(
            config.device.clone(),
            config.width,
            config.height,
            config.resolve_intrinsics(),
            config.sim.clone().unwrap_or_default(),
        )
    }

    pub fn frames_served(&self) -> u64 {
        self.frames_served
    }

    fn ensure_open(&self, stream: &str) -> Result<(), FloorError> {
        if self.open {
            Ok(())
        } else {
            Err(FloorError::FrameUnavailable {
                stream: stream.to_string(),
                details: format!("device '{}' is closed", self.id),
            })
        }
    }
}

impl DepthSource for SimRgbdSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn width(&self) -> u32 {
        self.depth.width
    }

    fn height(&self) -> u32 {
        self.depth.height
    }

    fn intrinsics(&self) -> Result<PinholeIntrinsics, FloorError> {
        Ok(self.intrinsics)
    }

    fn depth_frame(&mut self) -> Result<DepthFrame, FloorError> {
        self.ensure_open("depth")?;
        self.frames_served += 1;
        Ok(self.depth.clone())
    }

    fn color_frame(&mut self) -> Result<ColorFrame, FloorError> {
        self.ensure_open("color")?;
        Ok(self.color.clone())
    }

    fn close(&mut self) {
        if self.open {
            debug!(device = %self.id, frames = self.frames_served, "closing sim sensor");
        }
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Ray casting
// ────────────────────────────────────────────────────────────────────────────

fn render(
    width: u32,
    height: u32,
    k: &PinholeIntrinsics,
    scene: &SimSceneConfig,
) -> (DepthFrame, ColorFrame) {
    let pose = RigidTransform::from_translation_rpy(scene.camera_translation, scene.camera_rpy);
    let origin = pose.apply(Point3::new(0.0, 0.0, 0.0));

    let mut depth = Vec::with_capacity(width as usize * height as usize);
    let mut color = Vec::with_capacity(width as usize * height as usize * 3);

    for v in 0..height {
        for u in 0..width {
            // Unit optical depth, so the hit distance along `dir` is the
            // depth value itself.
            let tip = pose.apply(k.unproject(u, v, 1.0));
            let dir = [tip.x - origin.x, tip.y - origin.y, tip.z - origin.z];
            let o = [origin.x, origin.y, origin.z];

            let mut hit: Option<(f32, [u8; 3])> = None;
            if dir[2] < 0.0 {
                let t = (scene.floor_z - o[2]) / dir[2];
                if t > 0.0 {
                    let gx = o[0] + t * dir[0];
                    let gy = o[1] + t * dir[1];
                    hit = Some((t, checker(gx, gy)));
                }
            }
            for obstacle in &scene.obstacles {
                if let Some(t) = intersect_box(o, dir, obstacle) {
                    if hit.is_none_or(|(best, _)| t < best) {
                        hit = Some((t, obstacle.color));
                    }
                }
            }

            match hit {
                Some((t, rgb)) if t <= scene.max_range => {
                    depth.push(t);
                    color.extend_from_slice(&rgb);
                }
                _ => {
                    depth.push(0.0);
                    color.extend_from_slice(&NO_RETURN);
                }
            }
        }
    }

    (
        DepthFrame {
            width,
            height,
            data: depth,
        },
        ColorFrame {
            width,
            height,
            data: color,
        },
    )
}

/// 0.5 m floor tiles.
fn checker(x: f32, y: f32) -> [u8; 3] {
    let cx = (x / 0.5).floor() as i64;
    let cy = (y / 0.5).floor() as i64;
    if (cx + cy).rem_euclid(2) == 0 {
        FLOOR_LIGHT
    } else {
        FLOOR_DARK
    }
}

/// Slab test; returns the entry distance when the ray hits the box in front
/// of the origin.
fn intersect_box(o: [f32; 3], d: [f32; 3], b: &BoxObstacle) -> Option<f32> {
    let mut t_near = f32::NEG_INFINITY;
    let mut t_far = f32::INFINITY;
    for axis in 0..3 {
        if d[axis].abs() < f32::EPSILON {
            if o[axis] < b.min[axis] || o[axis] > b.max[axis] {
                return None;
            }
            continue;
        }
        let t1 = (b.min[axis] - o[axis]) / d[axis];
        let t2 = (b.max[axis] - o[axis]) / d[axis];
        t_near = t_near.max(t1.min(t2));
        t_far = t_far.min(t1.max(t2));
    }
    if t_near > t_far || t_far <= 0.0 {
        return None;
    }
    Some(if t_near > 0.0 { t_near } else { t_far })
}
