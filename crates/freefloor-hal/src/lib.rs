//! Device layer: RGB-D sensors, transform clients and the registry that
//! opens them by name.

pub mod camera;
pub mod config;
pub mod registry;
pub mod replay;
pub mod sim;
pub mod transform_client;

pub use camera::{ColorFrame, DepthFrame, DepthSource};
pub use config::{
    BoxObstacle, FrameEdge, ReplayConfig, SensorClientConfig, SimSceneConfig,
    TransformClientConfig,
};
pub use registry::DeviceRegistry;
pub use transform_client::{StaticTransformSource, TransformSource};
