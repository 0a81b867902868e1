//! In-memory collaborators for driving the loop without a device.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use freefloor_hal::{
    ColorFrame, DepthFrame, DepthSource, DeviceRegistry, TransformSource,
};
use freefloor_perception::{PinholeIntrinsics, RigidTransform};
use freefloor_runtime::FloorConfig;
use freefloor_types::FloorError;

pub const MOCK: &str = "mock";

/// What the mock sensor returns; tests edit it between cycles.
#[derive(Debug, Clone)]
pub struct SensorScript {
    pub width: u32,
    pub height: u32,
    pub intrinsics: Result<PinholeIntrinsics, FloorError>,
    pub depth: Result<DepthFrame, FloorError>,
    pub color: Result<ColorFrame, FloorError>,
    pub depth_reads: usize,
    pub close_calls: usize,
}

#[derive(Clone)]
pub struct MockSensor(Arc<Mutex<SensorScript>>);

impl MockSensor {
    /// A `width`×`height` sensor returning `depth` (row-major, metres) and a
    /// uniform grey color frame.
    pub fn new(width: u32, height: u32, intrinsics: PinholeIntrinsics, depth: Vec<f32>) -> Self {
        Self(Arc::new(Mutex::new(SensorScript {
            width,
            height,
            intrinsics: Ok(intrinsics),
            depth: Ok(DepthFrame {
                width,
                height,
                data: depth,
            }),
            color: Ok(grey(width, height)),
            depth_reads: 0,
            close_calls: 0,
        })))
    }

    pub fn script(&self) -> MutexGuard<'_, SensorScript> {
        self.0.lock().unwrap()
    }

    pub fn set_depth(&self, data: Vec<f32>) {
        let mut s = self.script();
        let (width, height) = (s.width, s.height);
        s.depth = Ok(DepthFrame {
            width,
            height,
            data,
        });
    }
}

impl DepthSource for MockSensor {
    fn id(&self) -> &str {
        MOCK
    }

    fn width(&self) -> u32 {
        self.script().width
    }

    fn height(&self) -> u32 {
        self.script().height
    }

    fn intrinsics(&self) -> Result<PinholeIntrinsics, FloorError> {
        self.script().intrinsics.clone()
    }

    fn depth_frame(&mut self) -> Result<DepthFrame, FloorError> {
        let mut s = self.script();
        s.depth_reads += 1;
        s.depth.clone()
    }

    fn color_frame(&mut self) -> Result<ColorFrame, FloorError> {
        self.script().color.clone()
    }

    fn close(&mut self) {
        self.script().close_calls += 1;
    }

    fn is_open(&self) -> bool {
        self.script().close_calls == 0
    }
}

#[derive(Debug, Clone)]
pub struct TransformScript {
    pub result: Result<RigidTransform, FloorError>,
    pub lookups: Vec<(String, String)>,
    pub close_calls: usize,
}

#[derive(Clone)]
pub struct MockTransforms(Arc<Mutex<TransformScript>>);

impl MockTransforms {
    pub fn returning(result: Result<RigidTransform, FloorError>) -> Self {
        Self(Arc::new(Mutex::new(TransformScript {
            result,
            lookups: Vec::new(),
            close_calls: 0,
        })))
    }

    pub fn identity() -> Self {
        Self::returning(Ok(RigidTransform::identity()))
    }

    pub fn script(&self) -> MutexGuard<'_, TransformScript> {
        self.0.lock().unwrap()
    }
}

impl TransformSource for MockTransforms {
    fn id(&self) -> &str {
        MOCK
    }

    fn get_transform(
        &mut self,
        from_frame: &str,
        to_frame: &str,
    ) -> Result<RigidTransform, FloorError> {
        let mut s = self.script();
        s.lookups.push((from_frame.to_string(), to_frame.to_string()));
        s.result.clone()
    }

    fn close(&mut self) {
        self.script().close_calls += 1;
    }

    fn is_open(&self) -> bool {
        self.script().close_calls == 0
    }
}

pub fn unavailable() -> FloorError {
    FloorError::TransformUnavailable {
        from: "/depth_camera_frame".to_string(),
        to: "/ground_frame".to_string(),
    }
}

/// Built-in drivers plus `"mock"` for both capabilities.
pub fn registry(sensor: &MockSensor, transforms: &MockTransforms) -> DeviceRegistry {
    let mut registry = DeviceRegistry::with_builtin_drivers();
    let sensor = sensor.clone();
    registry.register_depth_driver(MOCK, move |_| {
        Ok(Box::new(sensor.clone()) as Box<dyn DepthSource>)
    });
    let transforms = transforms.clone();
    registry.register_transform_driver(MOCK, move |_| {
        Ok(Box::new(transforms.clone()) as Box<dyn TransformSource>)
    });
    registry
}

pub fn mock_config(width: u32, height: u32) -> FloorConfig {
    FloorConfig::from_toml_str(&format!(
        r#"
        [RGBD_SENSOR_CLIENT]
        device = "{MOCK}"
        width = {width}
        height = {height}

        [TRANSFORM_CLIENT]
        device = "{MOCK}"
        "#
    ))
    .unwrap()
}

/// Focal lengths so large that every pixel lands in column (0, 0) under an
/// identity transform; ground z equals the depth value.
pub fn single_column() -> PinholeIntrinsics {
    PinholeIntrinsics {
        fx: 1.0e6,
        fy: 1.0e6,
        cx: 0.0,
        cy: 0.0,
    }
}

/// `x = 500 · u · z`, `y = 500 · v · z` under an identity transform.
pub fn spread() -> PinholeIntrinsics {
    PinholeIntrinsics {
        fx: 0.002,
        fy: 0.002,
        cx: 0.0,
        cy: 0.0,
    }
}

pub fn grey(width: u32, height: u32) -> ColorFrame {
    ColorFrame {
        width,
        height,
        data: vec![128; width as usize * height as usize * 3],
    }
}
