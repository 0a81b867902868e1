//! Recorded RGB-D frames played back from disk.
//!
//! A recording is a directory of `depth_NNNN.png` files (16-bit grayscale,
//! millimetres) with matching `color_NNNN.png` files.  Each call to
//! [`DepthSource::depth_frame`] advances to the next index;
//! [`DepthSource::color_frame`] returns the image paired with the last depth
//! frame.

use std::path::{Path, PathBuf};

use freefloor_perception::PinholeIntrinsics;
use freefloor_types::FloorError;
use tracing::{debug, info};

use crate::camera::{ColorFrame, DepthFrame, DepthSource};
use crate::config::{ReplayConfig, SensorClientConfig};

pub struct ReplayRgbdSensor {
    id: String,
    width: u32,
    height: u32,
    intrinsics: Option<PinholeIntrinsics>,
    frames: Vec<(PathBuf, PathBuf)>,
    cursor: usize,
    current: Option<usize>,
    loop_frames: bool,
    open: bool,
}

impl ReplayRgbdSensor {
    /// Index the recording directory.
    ///
    /// # Errors
    ///
    /// [`FloorError::DeviceOpen`] when the directory cannot be read or holds
    /// no `depth_*.png` file.
    pub fn open(
        id: impl Into<String>,
        width: u32,
        height: u32,
        intrinsics: Option<PinholeIntrinsics>,
        replay: &ReplayConfig,
    ) -> Result<Self, FloorError> {
        let id = id.into();
        let frames = index_recording(&replay.dir).map_err(|details| FloorError::DeviceOpen {
            device: id.clone(),
            details,
        })?;
        info!(device = %id, dir = %replay.dir.display(), frames = frames.len(), "replay recording opened");
        Ok(Self {
            id,
            width,
            height,
            intrinsics,
            frames,
            cursor: 0,
            current: None,
            loop_frames: replay.loop_frames,
            open: true,
        })
    }

    pub fn from_config(config: &SensorClientConfig) -> Result<Self, FloorError> {
        let replay = config.replay.as_ref().ok_or_else(|| FloorError::DeviceOpen {
            device: config.device.clone(),
            details: "missing [RGBD_SENSOR_CLIENT.replay] table".to_string(),
        })?;
        Self::open(
            config.device.clone(),
            config.width,
            config.height,
            config.resolve_intrinsics(),
            replay,
        )
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
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

fn index_recording(dir: &Path) -> Result<Vec<(PathBuf, PathBuf)>, String> {
    let entries = std::fs::read_dir(dir).map_err(|e| format!("{}: {e}", dir.display()))?;
    let mut depth_files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("depth_") && n.ends_with(".png"))
        })
        .collect();
    depth_files.sort();
    if depth_files.is_empty() {
        return Err(format!("no depth_*.png frames in {}", dir.display()));
    }
    Ok(depth_files
        .into_iter()
        .map(|depth| {
            let name = depth
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .replacen("depth_", "color_", 1);
            let color = depth.with_file_name(name);
            (depth, color)
        })
        .collect())
}

impl DepthSource for ReplayRgbdSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn intrinsics(&self) -> Result<PinholeIntrinsics, FloorError> {
        self.intrinsics.ok_or_else(|| {
            FloorError::IntrinsicsUnavailable(format!(
                "device '{}' has no [intrinsics] or hfov_deg configured",
                self.id
            ))
        })
    }

    fn depth_frame(&mut self) -> Result<DepthFrame, FloorError> {
        self.ensure_open("depth")?;
        if self.cursor >= self.frames.len() {
            if !self.loop_frames {
                return Err(FloorError::FrameUnavailable {
                    stream: "depth".to_string(),
                    details: "end of recording".to_string(),
                });
            }
            debug!(device = %self.id, "replay wrapped to first frame");
            self.cursor = 0;
        }
        let index = self.cursor;
        self.cursor += 1;
        self.current = Some(index);

        let path = &self.frames[index].0;
        let img = image::open(path)
            .map_err(|e| FloorError::FrameUnavailable {
                stream: "depth".to_string(),
                details: format!("{}: {e}", path.display()),
            })?
            .to_luma16();
        let (width, height) = img.dimensions();
        let data = img.into_raw().into_iter().map(|mm| mm as f32 / 1000.0).collect();
        Ok(DepthFrame {
            width,
            height,
            data,
        })
    }

    fn color_frame(&mut self) -> Result<ColorFrame, FloorError> {
        self.ensure_open("color")?;
        let index = self.current.ok_or_else(|| FloorError::FrameUnavailable {
            stream: "color".to_string(),
            details: "no depth frame read yet".to_string(),
        })?;
        let path = &self.frames[index].1;
        let img = image::open(path)
            .map_err(|e| FloorError::FrameUnavailable {
                stream: "color".to_string(),
                details: format!("{}: {e}", path.display()),
            })?
            .to_rgb8();
        let (width, height) = img.dimensions();
        Ok(ColorFrame {
            width,
            height,
            data: img.into_raw(),
        })
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
