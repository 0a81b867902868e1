//! [`FloorDetectionLoop`] – the periodic floor-classification pipeline.
//!
//! Each cycle:
//!
//! 1. **Acquire** – fetch a depth and a color frame and check both against
//!    the resolution recorded at initialisation.  Any failure skips the cycle
//!    without touching the shared state.
//! 2. **Locate** – look up the camera→ground transform.  A failed lookup
//!    falls back to the last transform obtained, or identity before the
//!    first success, and the cycle continues.
//! 3. **Classify** – under the shared-state lock: back-project the depth
//!    frame, move it into the ground frame with a [`PointProjector`], run the
//!    [`ColumnOcclusionClassifier`] and store the cloud and passable set.
//! 4. **Publish** – write the visualization mask to the image port.
//!
//! # Lifecycle
//!
//! ```text
//! init() ──► Ready ──► Running ⇄ Idle ──► Released
//!   │
//!   └─ Err(fatal)  (no loop value is ever produced)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use freefloor_hal::{ColorFrame, DepthFrame, DeviceRegistry, DepthSource, TransformSource};
use freefloor_middleware::{EventBus, OutputPort, Topic};
use freefloor_perception::{
    ColumnOcclusionClassifier, PinholeIntrinsics, PointProjector, RigidTransform,
};
use freefloor_types::{EventPayload, FloorError, FloorMask};
use tracing::{debug, error, info, instrument, warn};

use crate::config::FloorConfig;
use crate::shared_state::SharedFloorState;

/// Where the loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Every collaborator is open; no cycle has run yet.
    Ready,
    /// A cycle is in progress.
    Running,
    /// Between two cycles.
    Idle,
    /// Collaborators closed; further cycles are refused.
    Released,
}

/// Result of one call to [`FloorDetectionLoop::run_cycle`].
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Shared state was updated; `passable` pixels were found.
    Completed { passable: usize },
    /// The cycle was abandoned before touching shared state.
    Skipped(FloorError),
}

/// Point-in-time copy of the loop's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub completed: u64,
    pub skipped: u64,
    /// Cycles that ran on a fallback transform.
    pub degraded: u64,
}

/// Live counters, readable from other threads while the loop runs.
#[derive(Debug, Default)]
pub struct CycleCounters {
    completed: AtomicU64,
    skipped: AtomicU64,
    degraded: AtomicU64,
}

impl CycleCounters {
    pub fn snapshot(&self) -> CycleStats {
        CycleStats {
            completed: self.completed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
        }
    }
}

pub struct FloorDetectionLoop {
    sensor: Box<dyn DepthSource>,
    transforms: Box<dyn TransformSource>,
    image_port: OutputPort,
    intrinsics: PinholeIntrinsics,
    width: u32,
    height: u32,
    ground_frame: String,
    camera_frame: String,
    classifier: ColumnOcclusionClassifier,
    last_transform: Option<RigidTransform>,
    shared: SharedFloorState,
    state: LoopState,
    counters: Arc<CycleCounters>,
}

impl FloorDetectionLoop {
    /// Open every collaborator named by `config`.
    ///
    /// # Errors
    ///
    /// Any error here is fatal ([`FloorError::is_fatal`]): a missing section,
    /// an invalid threshold, a device that fails to open or lacks the needed
    /// capability, or unusable intrinsics.  Devices opened before the failure
    /// are closed again.
    pub fn init(
        config: &FloorConfig,
        registry: &DeviceRegistry,
        bus: &EventBus,
        shared: SharedFloorState,
    ) -> Result<Self, FloorError> {
        config.validate().inspect_err(|e| error!(error = %e, "invalid configuration"))?;
        let sensor_cfg = config.sensor_section()?;
        let transform_cfg = config.transform_section()?;

        let mut sensor = registry
            .open_depth_source(sensor_cfg)
            .inspect_err(|e| error!(error = %e, "unable to open the RGB-D sensor"))?;

        let mut transforms = match registry.open_transform_source(transform_cfg) {
            Ok(t) => t,
            Err(e) => {
                error!(error = %e, "unable to open the transform client");
                sensor.close();
                return Err(e);
            }
        };

        let intrinsics = match sensor.intrinsics().and_then(|k| {
            if k.is_valid() {
                Ok(k)
            } else {
                Err(FloorError::IntrinsicsUnavailable(format!(
                    "device '{}' reported degenerate intrinsics {k:?}",
                    sensor.id()
                )))
            }
        }) {
            Ok(k) => k,
            Err(e) => {
                error!(error = %e, "unable to get depth intrinsics");
                sensor.close();
                transforms.close();
                return Err(e);
            }
        };

        let (width, height) = (sensor.width(), sensor.height());
        let image_port = OutputPort::open(config.img_out_port.clone(), Topic::FloorMask, bus);

        info!(
            sensor = sensor.id(),
            transforms = transforms.id(),
            width,
            height,
            fx = intrinsics.fx,
            fy = intrinsics.fy,
            "floor detection loop ready"
        );

        Ok(Self {
            sensor,
            transforms,
            image_port,
            intrinsics,
            width,
            height,
            ground_frame: config.clipping.ground_frame_id.clone(),
            camera_frame: config.clipping.camera_frame_id.clone(),
            classifier: ColumnOcclusionClassifier::new(config.classifier_params()),
            last_transform: None,
            shared,
            state: LoopState::Ready,
            counters: Arc::default(),
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> CycleStats {
        self.counters.snapshot()
    }

    /// Shared handle on the counters, for status reporting from other
    /// threads.
    pub fn counters(&self) -> Arc<CycleCounters> {
        Arc::clone(&self.counters)
    }

    /// Resolution recorded at initialisation.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn last_transform(&self) -> Option<&RigidTransform> {
        self.last_transform.as_ref()
    }

    pub fn shared_state(&self) -> &SharedFloorState {
        &self.shared
    }

    /// Run one detection cycle.
    #[instrument(name = "floor_cycle", skip(self), fields(sensor = self.sensor.id()))]
    pub fn run_cycle(&mut self) -> CycleOutcome {
        if self.state == LoopState::Released {
            return CycleOutcome::Skipped(FloorError::FrameUnavailable {
                stream: "depth".to_string(),
                details: "loop has been released".to_string(),
            });
        }
        self.state = LoopState::Running;
        let outcome = match self.cycle() {
            Ok(passable) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                CycleOutcome::Completed { passable }
            }
            Err(e) => {
                debug!(error = %e, "cycle skipped");
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                CycleOutcome::Skipped(e)
            }
        };
        self.state = LoopState::Idle;
        outcome
    }

    fn cycle(&mut self) -> Result<usize, FloorError> {
        let depth = self.sensor.depth_frame()?;
        depth.validate()?;
        self.check_depth_size(&depth)?;

        let color = self.sensor.color_frame()?;
        color.validate()?;
        self.check_color_size(&color)?;

        let transform = self.camera_to_ground();
        let canvas = color.to_rgba()?;

        let (mask, passable) = {
            let mut snapshot = self.shared.lock();
            let mut cloud = self.intrinsics.back_project(&depth.data, self.width, self.height);
            PointProjector::new(transform).project_in_place(&mut cloud);
            let result = self.classifier.classify(&cloud, &canvas)?;
            let passable = result.passable.len();
            snapshot.cloud = cloud;
            snapshot.passable = result.passable;
            snapshot.pass += 1;
            (result.mask, passable)
        };

        let (width, height) = mask.dimensions();
        let payload = EventPayload::FloorMask(FloorMask {
            width,
            height,
            rgba: mask.into_raw().into(),
        });
        if let Err(e) = self.image_port.write(payload) {
            warn!(port = self.image_port.name(), error = %e, "visualization not published");
        }
        Ok(passable)
    }

    fn check_depth_size(&self, frame: &DepthFrame) -> Result<(), FloorError> {
        self.check_size(frame.width, frame.height)
    }

    fn check_color_size(&self, frame: &ColorFrame) -> Result<(), FloorError> {
        self.check_size(frame.width, frame.height)
    }

    fn check_size(&self, width: u32, height: u32) -> Result<(), FloorError> {
        if (width, height) != (self.width, self.height) {
            return Err(FloorError::FrameSizeMismatch {
                expected_width: self.width,
                expected_height: self.height,
                actual_width: width,
                actual_height: height,
            });
        }
        Ok(())
    }

    /// Fresh transform, or the degraded fallback.
    fn camera_to_ground(&mut self) -> RigidTransform {
        match self
            .transforms
            .get_transform(&self.camera_frame, &self.ground_frame)
        {
            Ok(t) => {
                self.last_transform = Some(t);
                t
            }
            Err(e) => {
                self.counters.degraded.fetch_add(1, Ordering::Relaxed);
                let fallback = self.last_transform.unwrap_or_else(RigidTransform::identity);
                warn!(
                    error = %e,
                    using_last_known = self.last_transform.is_some(),
                    "unable to get the transform, continuing with fallback"
                );
                fallback
            }
        }
    }

    /// Close every collaborator.  Safe to call more than once.
    pub fn release(&mut self) {
        if self.state == LoopState::Released {
            return;
        }
        self.sensor.close();
        self.transforms.close();
        self.image_port.close();
        self.state = LoopState::Released;
        let stats = self.stats();
        info!(
            completed = stats.completed,
            skipped = stats.skipped,
            degraded = stats.degraded,
            "floor detection loop released"
        );
    }
}

impl Drop for FloorDetectionLoop {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freefloor_middleware::TopicReceiver;

    fn setup() -> (FloorDetectionLoop, TopicReceiver, SharedFloorState) {
        let bus = EventBus::default();
        let rx = bus.subscribe_to(Topic::FloorMask);
        let shared = SharedFloorState::new();
        let lp = FloorDetectionLoop::init(
            &FloorConfig::default(),
            &DeviceRegistry::with_builtin_drivers(),
            &bus,
            shared.clone(),
        )
        .unwrap();
        (lp, rx, shared)
    }

    #[test]
    fn init_enters_ready() {
        let (lp, _rx, _) = setup();
        assert_eq!(lp.state(), LoopState::Ready);
        assert_eq!(lp.dimensions(), (64, 48));
    }

    #[test]
    fn default_sim_cycle_finds_floor_and_publishes() {
        let (mut lp, mut rx, shared) = setup();
        let outcome = lp.run_cycle();
        let CycleOutcome::Completed { passable } = outcome else {
            panic!("expected a completed cycle, got {outcome:?}");
        };
        assert!(passable > 0);
        assert_eq!(shared.passable_count(), passable);
        assert_eq!(lp.state(), LoopState::Idle);

        let event = rx.try_recv().unwrap();
        let EventPayload::FloorMask(mask) = event.payload else {
            panic!("expected a mask");
        };
        assert_eq!((mask.width, mask.height), (64, 48));
        assert_eq!(mask.rgba.len(), 64 * 48 * 4);
        assert_eq!(event.source, "/freeFloorViewer/floorEnhanced:o");
    }

    #[test]
    fn default_obstacle_blocks_some_columns() {
        let (mut lp, _rx, shared) = setup();
        lp.run_cycle();
        let snap = shared.lock();
        // Some finite points sit on the box, above floor height.
        assert!(snap.cloud.points().iter().any(|p| p.is_finite() && p.z > 0.5));
        assert!(snap.passable.len() < snap.cloud.len());
    }

    #[test]
    fn release_is_idempotent_and_refuses_cycles() {
        let (mut lp, _rx, _) = setup();
        lp.release();
        lp.release();
        assert_eq!(lp.state(), LoopState::Released);
        assert!(matches!(lp.run_cycle(), CycleOutcome::Skipped(_)));
        assert_eq!(lp.stats().completed, 0);
    }

    #[test]
    fn unknown_sensor_is_fatal() {
        let mut cfg = FloorConfig::default();
        if let Some(s) = cfg.sensor.as_mut() {
            s.device = "kinect".to_string();
        }
        let err = FloorDetectionLoop::init(
            &cfg,
            &DeviceRegistry::with_builtin_drivers(),
            &EventBus::default(),
            SharedFloorState::new(),
        )
        .err()
        .unwrap();
        assert!(err.is_fatal());
    }
}
