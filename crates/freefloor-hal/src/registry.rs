//! [`DeviceRegistry`] – resolves configured device names to driver
//! instances.
//!
//! Each `[*_CLIENT]` section names a `device`.  The registry maps that name to
//! a factory for the matching capability.  Opening a name that is only
//! registered for the other capability yields
//! [`FloorError::CapabilityUnavailable`]; an unknown name yields
//! [`FloorError::DeviceOpen`].

use std::collections::HashMap;

use freefloor_types::FloorError;
use tracing::info;

use crate::camera::DepthSource;
use crate::config::{SensorClientConfig, TransformClientConfig};
use crate::replay::ReplayRgbdSensor;
use crate::sim::SimRgbdSensor;
use crate::transform_client::{StaticTransformSource, TransformSource};

pub type DepthFactory =
    Box<dyn Fn(&SensorClientConfig) -> Result<Box<dyn DepthSource>, FloorError> + Send + Sync>;

pub type TransformFactory = Box<
    dyn Fn(&TransformClientConfig) -> Result<Box<dyn TransformSource>, FloorError> + Send + Sync,
>;

const DEPTH_CAPABILITY: &str = "RGB-D sensor";
const TRANSFORM_CAPABILITY: &str = "transform client";

#[derive(Default)]
pub struct DeviceRegistry {
    depth: HashMap<String, DepthFactory>,
    transform: HashMap<String, TransformFactory>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with `"sim"`, `"replay"` and `"static"`.
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::new();
        registry.register_depth_driver("sim", |cfg| {
            Ok(Box::new(SimRgbdSensor::from_config(cfg)) as Box<dyn DepthSource>)
        });
        registry.register_depth_driver("replay", |cfg| {
            Ok(Box::new(ReplayRgbdSensor::from_config(cfg)?) as Box<dyn DepthSource>)
        });
        registry.register_transform_driver("static", |cfg| {
            Ok(Box::new(StaticTransformSource::from_config(cfg)) as Box<dyn TransformSource>)
        });
        registry
    }

    /// Register a depth driver.  Any previous factory with the same name is
    /// replaced.
    pub fn register_depth_driver<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&SensorClientConfig) -> Result<Box<dyn DepthSource>, FloorError>
            + Send
            + Sync
            + 'static,
    {
        self.depth.insert(name.into(), Box::new(factory));
    }

    /// Register a transform driver.  Any previous factory with the same name
    /// is replaced.
    pub fn register_transform_driver<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&TransformClientConfig) -> Result<Box<dyn TransformSource>, FloorError>
            + Send
            + Sync
            + 'static,
    {
        self.transform.insert(name.into(), Box::new(factory));
    }

    pub fn depth_drivers(&self) -> impl Iterator<Item = &str> {
        self.depth.keys().map(String::as_str)
    }

    pub fn transform_drivers(&self) -> impl Iterator<Item = &str> {
        self.transform.keys().map(String::as_str)
    }

    pub fn open_depth_source(
        &self,
        config: &SensorClientConfig,
    ) -> Result<Box<dyn DepthSource>, FloorError> {
        match self.depth.get(&config.device) {
            Some(factory) => {
                info!(device = %config.device, width = config.width, height = config.height, "opening RGB-D sensor");
                factory(config)
            }
            None => Err(self.missing(&config.device, DEPTH_CAPABILITY)),
        }
    }

    pub fn open_transform_source(
        &self,
        config: &TransformClientConfig,
    ) -> Result<Box<dyn TransformSource>, FloorError> {
        match self.transform.get(&config.device) {
            Some(factory) => {
                info!(device = %config.device, edges = config.transforms.len(), "opening transform client");
                factory(config)
            }
            None => Err(self.missing(&config.device, TRANSFORM_CAPABILITY)),
        }
    }

    fn missing(&self, device: &str, capability: &str) -> FloorError {
        if self.depth.contains_key(device) || self.transform.contains_key(device) {
            FloorError::CapabilityUnavailable {
                device: device.to_string(),
                capability: capability.to_string(),
            }
        } else {
            FloorError::DeviceOpen {
                device: device.to_string(),
                details: "no driver registered under this name".to_string(),
            }
        }
    }
}
