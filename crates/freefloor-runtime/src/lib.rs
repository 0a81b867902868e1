//! `freefloor-runtime` – the detection pipeline and its scheduling.
//!
//! # Modules
//!
//! - [`config`] – [`FloorConfig`][config::FloorConfig]: the TOML model with
//!   the `Z_CLIPPING_PLANES`, `RGBD_SENSOR_CLIENT` and `TRANSFORM_CLIENT`
//!   sections.
//! - [`shared_state`] – [`SharedFloorState`][shared_state::SharedFloorState]:
//!   the lock-guarded cloud and passable set, injected into both the loop and
//!   the query handler.
//! - [`floor_loop`] – [`FloorDetectionLoop`][floor_loop::FloorDetectionLoop]:
//!   acquire, locate, classify, publish.
//! - [`target_query`] –
//!   [`TargetQueryHandler`][target_query::TargetQueryHandler]: turns clicks on
//!   passable pixels into ground-frame positions.
//! - [`scheduler`] – [`PeriodicThread`][scheduler::PeriodicThread]: a
//!   fixed-period OS thread with overrun logging and cooperative shutdown.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console
//!   logging plus optional OTLP span export.

pub mod config;
pub mod floor_loop;
pub mod scheduler;
pub mod shared_state;
pub mod target_query;
pub mod telemetry;

pub use config::FloorConfig;
pub use floor_loop::{CycleCounters, CycleOutcome, CycleStats, FloorDetectionLoop, LoopState};
pub use scheduler::{PeriodicTask, PeriodicThread};
pub use shared_state::{FloorSnapshot, SharedFloorState};
pub use target_query::{QueryOutcome, TargetQueryHandler};
pub use telemetry::{TracerProviderGuard, init_tracing};
