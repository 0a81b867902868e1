//! Named ports on top of the bus.
//!
//! An [`OutputPort`] binds a port name (e.g. `"/free_floor_viewer/target:o"`)
//! to a bus [`Topic`].  Writes are best-effort: with no reader attached the
//! event is dropped and the write still succeeds.  Once closed, a port
//! refuses further writes.
//!
//! An [`InputPort`] is the reading end: a named subscription that skips over
//! lag instead of surfacing it.

use std::sync::atomic::{AtomicBool, Ordering};

use freefloor_types::{Event, EventPayload, FloorError};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Topic, TopicReceiver};

#[derive(Debug)]
pub struct OutputPort {
    name: String,
    topic: Topic,
    bus: EventBus,
    closed: AtomicBool,
}

impl OutputPort {
    pub fn open(name: impl Into<String>, topic: Topic, bus: &EventBus) -> Self {
        let name = name.into();
        info!(port = %name, ?topic, "output port opened");
        Self {
            name,
            topic,
            bus: bus.clone(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Wrap `payload` in an [`Event`] sourced from this port and publish it.
    ///
    /// Returns the number of readers that received it.
    pub fn write(&self, payload: EventPayload) -> Result<usize, FloorError> {
        if self.is_closed() {
            return Err(FloorError::Channel(format!("port {} is closed", self.name)));
        }
        Ok(self.bus.publish_to(self.topic, Event::new(self.name.clone(), payload)))
    }

    /// Close the port.  Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        if first {
            debug!(port = %self.name, "output port closed");
        }
        first
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

pub struct InputPort {
    name: String,
    receiver: TopicReceiver,
}

impl InputPort {
    pub fn open(name: impl Into<String>, topic: Topic, bus: &EventBus) -> Self {
        let name = name.into();
        info!(port = %name, ?topic, "input port opened");
        Self {
            name,
            receiver: bus.subscribe_to(topic),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next event, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(n)) => {
                    warn!(port = %self.name, dropped = n, "input port lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
