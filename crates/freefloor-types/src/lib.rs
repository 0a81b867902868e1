//! Shared message types and the error enum used across the floor pipeline.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unified event wrapper for the in-process event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Name of the port that emitted the event, e.g. `"/freeFloorViewer/floorEnhanced:o"`.
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// Color frame with passable pixels overlaid.
    FloorMask(FloorMask),
    /// Inbound pixel selection from a viewer.
    PixelClick(PixelClick),
    /// Ground-frame position of a clicked passable pixel.
    Target(TargetPosition),
    /// Lifecycle or fault notification.
    Alert { component: String, message: String },
}

/// Row-major RGBA8 visualization image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorMask {
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` bytes. Shared so that fan-out to several
    /// subscribers does not copy the buffer.
    pub rgba: Arc<[u8]>,
}

/// A pixel coordinate as received from the outside world. Signed because
/// the sender is not trusted to stay inside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelClick {
    pub u: i64,
    pub v: i64,
}

/// Ground-frame (x, y) of a floor point, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetPosition {
    pub x: f32,
    pub y: f32,
}

/// How a [`FloorError`] affects the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Initialisation cannot complete; the loop never runs.
    Fatal,
    /// The current cycle is skipped and the next one retried.
    Recoverable,
    /// The cycle continues with a fallback value.
    Degraded,
    /// A single query is dropped without touching shared state.
    Query,
}

/// Error type spanning configuration, device, frame, transform and query failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FloorError {
    #[error("Missing configuration section: {0}")]
    MissingConfigSection(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to open device {device}: {details}")]
    DeviceOpen { device: String, details: String },

    #[error("Device {device} does not provide the {capability} interface")]
    CapabilityUnavailable { device: String, capability: String },

    #[error("Intrinsic parameters unavailable: {0}")]
    IntrinsicsUnavailable(String),

    #[error("{stream} frame unavailable: {details}")]
    FrameUnavailable { stream: String, details: String },

    #[error("Malformed {stream} frame: {details}")]
    MalformedFrame { stream: String, details: String },

    #[error("Invalid image size: ({actual_width} {actual_height}) vs ({expected_width} {expected_height})")]
    FrameSizeMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("No transform from {from} to {to}")]
    TransformUnavailable { from: String, to: String },

    #[error("Pixel ({u}, {v}) outside image boundaries {width}x{height}")]
    PixelOutOfBounds { u: i64, v: i64, width: u32, height: u32 },

    #[error("Channel error: {0}")]
    Channel(String),
}

impl FloorError {
    /// Classify the error according to how the pipeline reacts to it.
    pub fn severity(&self) -> Severity {
        match self {
            FloorError::MissingConfigSection(_)
            | FloorError::InvalidConfig(_)
            | FloorError::DeviceOpen { .. }
            | FloorError::CapabilityUnavailable { .. }
            | FloorError::IntrinsicsUnavailable(_) => Severity::Fatal,
            FloorError::FrameUnavailable { .. }
            | FloorError::MalformedFrame { .. }
            | FloorError::FrameSizeMismatch { .. }
            | FloorError::Channel(_) => Severity::Recoverable,
            FloorError::TransformUnavailable { .. } => Severity::Degraded,
            FloorError::PixelOutOfBounds { .. } => Severity::Query,
        }
    }

    /// True for errors that must abort initialisation.
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_click_serialization_roundtrip() {
        let click = PixelClick { u: 12, v: -3 };
        let json = serde_json::to_string(&click).unwrap();
        let back: PixelClick = serde_json::from_str(&json).unwrap();
        assert_eq!(click, back);
    }

    #[test]
    fn floor_mask_event_roundtrip() {
        let mask = FloorMask {
            width: 1,
            height: 2,
            rgba: Arc::from(vec![0u8, 255, 0, 153, 10, 20, 30, 255]),
        };
        let event = Event::new("/img:o", EventPayload::FloorMask(mask.clone()));
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        match back.payload {
            EventPayload::FloorMask(m) => assert_eq!(m, mask),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn severity_matches_taxonomy() {
        assert_eq!(
            FloorError::MissingConfigSection("RGBD_SENSOR_CLIENT".into()).severity(),
            Severity::Fatal
        );
        assert_eq!(
            FloorError::FrameUnavailable {
                stream: "depth".into(),
                details: "timeout".into()
            }
            .severity(),
            Severity::Recoverable
        );
        assert_eq!(
            FloorError::TransformUnavailable {
                from: "/a".into(),
                to: "/b".into()
            }
            .severity(),
            Severity::Degraded
        );
        assert_eq!(
            FloorError::PixelOutOfBounds {
                u: 5,
                v: 0,
                width: 4,
                height: 4
            }
            .severity(),
            Severity::Query
        );
    }

    #[test]
    fn floor_error_display() {
        let err = FloorError::FrameSizeMismatch {
            expected_width: 640,
            expected_height: 480,
            actual_width: 320,
            actual_height: 240,
        };
        assert_eq!(err.to_string(), "Invalid image size: (320 240) vs (640 480)");
        assert!(err.to_string().contains("640"));
        assert!(!err.is_fatal());

        let err = FloorError::CapabilityUnavailable {
            device: "replay".into(),
            capability: "IRGBDSensor".into(),
        };
        assert!(err.to_string().contains("replay"));
        assert!(err.is_fatal());
    }
}
