//! [`TargetQueryHandler`] – answers "where is this floor pixel?" clicks.
//!
//! A click `(u, v)` inside the latest frame that belongs to the passable set
//! yields the ground-frame `(x, y)` of that pixel on the target port.  Clicks
//! on non-floor pixels produce nothing; clicks outside the frame are logged
//! and dropped.

use freefloor_middleware::{EventBus, InputPort, OutputPort, Topic};
use freefloor_types::{EventPayload, FloorError, TargetPosition};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::FloorConfig;
use crate::shared_state::SharedFloorState;

/// What a single query did.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Emitted(TargetPosition),
    NotPassable,
    OutOfBounds(FloorError),
}

pub struct TargetQueryHandler {
    shared: SharedFloorState,
    port: OutputPort,
}

impl TargetQueryHandler {
    pub fn new(shared: SharedFloorState, port: OutputPort) -> Self {
        Self { shared, port }
    }

    /// Open the target port named in `config`.
    pub fn open(config: &FloorConfig, bus: &EventBus, shared: SharedFloorState) -> Self {
        let port = OutputPort::open(config.target_pos_port.clone(), Topic::TargetPosition, bus);
        Self::new(shared, port)
    }

    /// Answer one click.
    pub fn handle(&self, u: i64, v: i64) -> QueryOutcome {
        let position = {
            let snapshot = self.shared.lock();
            let (width, height) = (snapshot.cloud.width(), snapshot.cloud.height());
            if u < 0 || v < 0 || u >= i64::from(width) || v >= i64::from(height) {
                let err = FloorError::PixelOutOfBounds {
                    u,
                    v,
                    width,
                    height,
                };
                error!(error = %err, "query dropped");
                return QueryOutcome::OutOfBounds(err);
            }
            let (c, r) = (u as u32, v as u32);
            if !snapshot.passable.contains(c, r) {
                return QueryOutcome::NotPassable;
            }
            match snapshot.cloud.get(c, r) {
                Some(p) => TargetPosition { x: p.x, y: p.y },
                None => return QueryOutcome::NotPassable,
            }
        };

        if let Err(e) = self.port.write(EventPayload::Target(position)) {
            warn!(port = self.port.name(), error = %e, "target not published");
        }
        debug!(u, v, x = position.x, y = position.y, "target emitted");
        QueryOutcome::Emitted(position)
    }

    /// Serve clicks from `clicks` until `shutdown` turns `true` (or its
    /// sender is dropped), then close the target port.
    ///
    /// The handler is handed back released.
    pub async fn run(self, mut clicks: InputPort, mut shutdown: watch::Receiver<bool>) -> Self {
        info!(input = clicks.name(), output = self.port.name(), "target query handler started");
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            tokio::select! {
                event = clicks.recv() => match event {
                    Some(event) => {
                        if let EventPayload::PixelClick(click) = event.payload {
                            self.handle(click.u, click.v);
                        }
                    }
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        self.release();
        info!(output = self.port.name(), "target query handler stopped");
        self
    }

    /// Close the target port.  Idempotent.
    pub fn release(&self) {
        self.port.close();
    }

    pub fn is_released(&self) -> bool {
        self.port.is_closed()
    }
}
